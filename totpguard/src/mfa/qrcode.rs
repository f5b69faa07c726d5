use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, Rgb};
use qrcode::{EcLevel, QrCode};

use super::Authenticator;
use crate::error::{Error, Result};

const QR_MIN_DIMENSION: u32 = 300;

const DEFAULT_BACKGROUND: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);

const DEFAULT_FOREGROUND: Rgb<u8> = Rgb([0x00, 0x00, 0x00]);

/// Parses `#RGB` or `#RRGGBB` (leading `#` optional). An empty value yields `fallback`.
pub fn parse_hex_color(hex: &str, fallback: Rgb<u8>) -> Result<Rgb<u8>> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.is_empty() {
        return Ok(fallback);
    }

    let invalid = || Error::InvalidColor(hex.to_owned());
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());

    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    match digits.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in rgb.iter_mut().enumerate() {
                let nibble = channel(&digits[i..i + 1])?;
                *c = nibble * 0x11;
            }
            Ok(Rgb(rgb))
        }
        6 => Ok(Rgb([
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        ])),
        _ => Err(invalid()),
    }
}

/// Renders `payload` as a PNG QR code of at least 300x300 pixels.
pub fn render_qr_png(payload: &str, background: Rgb<u8>, foreground: Rgb<u8>) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L)
        .map_err(|e| Error::Render(e.to_string()))?;

    let img = code
        .render::<Rgb<u8>>()
        .dark_color(foreground)
        .light_color(background)
        .min_dimensions(QR_MIN_DIMENSION, QR_MIN_DIMENSION)
        .build();

    // image 0.25 needs Write + Seek
    let mut cursor = Cursor::new(Vec::<u8>::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| Error::Render(e.to_string()))?;

    Ok(cursor.into_inner())
}

impl Authenticator {
    /// Provisions `identity` and returns its enrollment QR code as a Base64 encoded PNG, drawn
    /// with the configured colors.
    pub async fn provisioning_qr_code(&self, identity: &str) -> Result<String> {
        let background = parse_hex_color(&self.settings.bg_color_hex, DEFAULT_BACKGROUND)?;
        let foreground = parse_hex_color(&self.settings.fg_color_hex, DEFAULT_FOREGROUND)?;

        let provisioning = self.provision(identity).await?;
        let png = render_qr_png(&provisioning.uri, background, foreground)?;

        Ok(STANDARD.encode(png))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_long_hex_forms() {
        let white = parse_hex_color("#FFF", DEFAULT_FOREGROUND).unwrap();
        assert_eq!(white, Rgb([255, 255, 255]));

        let teal = parse_hex_color("008080", DEFAULT_FOREGROUND).unwrap();
        assert_eq!(teal, Rgb([0, 128, 128]));

        let grey = parse_hex_color("#a1B", DEFAULT_FOREGROUND).unwrap();
        assert_eq!(grey, Rgb([0xaa, 0x11, 0xbb]));
    }

    #[test]
    fn empty_color_falls_back() {
        assert_eq!(parse_hex_color("", DEFAULT_BACKGROUND).unwrap(), DEFAULT_BACKGROUND);
        assert_eq!(parse_hex_color("#", DEFAULT_FOREGROUND).unwrap(), DEFAULT_FOREGROUND);
    }

    #[test]
    fn malformed_color_is_rejected() {
        for bad in ["#FFFF", "#GGG", "red", "#12345z", "#é1", "#+f+f+f"] {
            assert!(matches!(
                parse_hex_color(bad, DEFAULT_BACKGROUND),
                Err(Error::InvalidColor(_))
            ));
        }
    }

    #[test]
    fn renders_png_in_requested_colors() {
        let background = Rgb([0xff, 0x00, 0x00]);
        let foreground = Rgb([0x00, 0x00, 0xff]);
        let png = render_qr_png("otpauth://totp/x:y@x?secret=ABC", background, foreground).unwrap();

        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let img = image::load_from_memory(&png).unwrap().to_rgb8();
        assert!(img.width() >= QR_MIN_DIMENSION && img.height() >= QR_MIN_DIMENSION);
        // quiet zone
        assert_eq!(*img.get_pixel(0, 0), background);
        assert!(img.pixels().any(|p| *p == foreground));
    }
}
