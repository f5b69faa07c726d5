use base32::Alphabet::Rfc4648;
use hmac::{Hmac, Mac};
use rand::{TryRngCore, rngs::OsRng};
use sha1::Sha1;

use crate::error::{Error, Result};

/// Length of a time step in seconds.
pub const TIME_STEP_SECONDS: i64 = 30;

/// Number of digest bytes folded into the code.
pub const DYNAMIC_TRUNCATION_WIDTH: usize = 4;

pub const CODE_DIGITS: usize = 6;

const CODE_MODULUS: u32 = 1_000_000;

const SECRET_LEN: usize = 16;

const SECRET_BUFFER_LEN: usize = 20;

/// Maps a Unix timestamp to its 30 second step, flooring toward negative infinity.
pub fn step_at(unix_seconds: i64) -> i64 {
    unix_seconds.div_euclid(TIME_STEP_SECONDS)
}

/// Time step of the system clock.
pub fn current_step() -> i64 {
    step_at(super::clock::system_unix_seconds())
}

/// Generates a fresh shared secret: 16 bytes from the OS CSPRNG, Base32 encoded with padding.
pub fn generate_secret() -> Result<String> {
    let mut buffer = [0u8; SECRET_BUFFER_LEN];
    OsRng
        .try_fill_bytes(&mut buffer)
        .map_err(|e| Error::Entropy(e.to_string()))?;

    Ok(base32::encode(
        Rfc4648 { padding: true },
        &buffer[..SECRET_LEN],
    ))
}

/// Decodes a Base32 secret, ignoring case and trailing padding.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>> {
    let normalized = secret.trim().trim_end_matches('=').to_uppercase();
    match base32::decode(Rfc4648 { padding: false }, &normalized) {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(Error::InvalidSecret),
    }
}

/// Computes the code for `step` as an integer in `0..1_000_000`.
pub fn generate_code(step: i64, secret: &str) -> Result<u32> {
    let key = decode_secret(secret)?;

    let mut mac =
        Hmac::<Sha1>::new_from_slice(&key).map_err(|e| Error::Crypto(e.to_string()))?;
    mac.update(&step.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let mut truncated: u32 = 0;
    for byte in &digest[offset..offset + DYNAMIC_TRUNCATION_WIDTH] {
        truncated = (truncated << 8) | u32::from(*byte);
    }
    truncated &= 0x7fff_ffff;

    Ok(truncated % CODE_MODULUS)
}

/// Zero-pads a code for display.
pub fn format_code(code: u32) -> String {
    format!("{:0width$}", code, width = CODE_DIGITS)
}
