use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid base32 secret")]
    InvalidSecret,

    #[error("hmac computation failed: {0}")]
    Crypto(String),

    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    #[error("invalid hex color: {0:?}")]
    InvalidColor(String),

    #[error("qr code rendering failed: {0}")]
    Render(String),
}

/// Failures reported by the storage collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0}ms")]
    Timeout(u64),

    #[error("account {0} already exists")]
    Conflict(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("no cipher configured")]
    Unavailable,

    #[error("{0}")]
    Failed(String),
}

impl Error {
    /// Short machine-readable name, used in logs and rejection reasons.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidSecret => "invalid_secret",
            Error::Crypto(_) => "crypto",
            Error::Entropy(_) => "entropy",
            Error::Storage(_) => "storage",
            Error::Cipher(_) => "cipher",
            Error::Config(_) => "config",
            Error::InvalidColor(_) => "invalid_color",
            Error::Render(_) => "render",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
