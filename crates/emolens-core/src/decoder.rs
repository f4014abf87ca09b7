//! Base64 payload decoding into a validated BGR pixel grid.
//!
//! The image format is sniffed from content; a `data:image/<fmt>;base64,`
//! header is stripped but its declared format is never trusted.

use crate::types::PixelGrid;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::borrow::Cow;
use std::io::Cursor;
use thiserror::Error;

const DATA_URI_PREFIX: &str = "data:image/";
const BASE64_MARKER: &str = ";base64,";

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("payload is not valid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    #[error("payload is not a decodable image: {0}")]
    InvalidImage(String),
}

/// The `<fmt>` a `data:image/<fmt>;base64,` header declares, if any.
///
/// Informational only: decoding always sniffs the content.
pub fn declared_format(payload: &str) -> Option<&str> {
    let rest = payload.trim_start().strip_prefix(DATA_URI_PREFIX)?;
    let idx = rest.rfind(BASE64_MARKER)?;
    (idx > 0).then(|| &rest[..idx])
}

/// Strip a leading `data:image/...;base64,` header, if any.
///
/// The header match is greedy: everything up to the last `;base64,` marker
/// is discarded. Surrounding whitespace is trimmed.
pub fn strip_data_uri(payload: &str) -> &str {
    let trimmed = payload.trim();
    if let Some(rest) = trimmed.strip_prefix(DATA_URI_PREFIX) {
        match rest.rfind(BASE64_MARKER) {
            Some(idx) if idx > 0 => return &rest[idx + BASE64_MARKER.len()..],
            _ => {}
        }
    }
    trimmed
}

/// Decode a base64 (optionally data-URI prefixed) image payload.
pub fn decode(payload: &str) -> Result<PixelGrid, DecodeError> {
    if let Some(declared) = declared_format(payload) {
        tracing::debug!(declared = %declared, "data uri header stripped");
    }
    let encoded = strip_data_uri(payload);

    // Line-wrapped base64 is common from browsers and CLI tools.
    let encoded: Cow<'_, str> = if encoded.bytes().any(|b| b.is_ascii_whitespace()) {
        Cow::Owned(encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect())
    } else {
        Cow::Borrowed(encoded)
    };

    let bytes = STANDARD.decode(encoded.as_bytes()).map_err(|e| {
        tracing::debug!(error = %e, "payload rejected: bad base64");
        DecodeError::InvalidEncoding(e)
    })?;

    decode_bytes(&bytes)
}

/// Decode raw compressed image bytes (JPEG, PNG, ...) into a BGR grid.
///
/// The EXIF orientation, when present, is applied so the grid is upright.
pub fn decode_bytes(bytes: &[u8]) -> Result<PixelGrid, DecodeError> {
    let invalid = |reason: String| {
        tracing::debug!(reason = %reason, len = bytes.len(), "payload rejected: not an image");
        DecodeError::InvalidImage(reason)
    };

    if bytes.is_empty() {
        return Err(invalid("empty buffer".into()));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| invalid(e.to_string()))?;
    let Some(format) = reader.format() else {
        return Err(invalid("unrecognized image format".into()));
    };

    let mut decoder = reader.into_decoder().map_err(|e| invalid(e.to_string()))?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder).map_err(|e| invalid(e.to_string()))?;
    image.apply_orientation(orientation);
    tracing::debug!(
        sniffed = ?format,
        ?orientation,
        width = image.width(),
        height = image.height(),
        "image decoded"
    );

    PixelGrid::from_rgb(image.into_rgb8())
        .ok_or_else(|| invalid("image has a zero dimension".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut buf, format)
            .unwrap();
        buf.into_inner()
    }

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x * 3) as u8, (y * 5) as u8, 128]))
    }

    #[test]
    fn test_strip_data_uri() {
        assert_eq!(strip_data_uri("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_uri("data:image/jpeg;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_uri("  QUJD\n"), "QUJD");
        // No header: left alone.
        assert_eq!(strip_data_uri("QUJD"), "QUJD");
        // Format must be non-empty for the header to match.
        assert_eq!(strip_data_uri("data:image/;base64,QUJD"), "data:image/;base64,QUJD");
    }

    #[test]
    fn test_declared_format() {
        assert_eq!(declared_format("data:image/png;base64,AAAA"), Some("png"));
        assert_eq!(declared_format("  data:image/svg+xml;base64,AAAA"), Some("svg+xml"));
        assert_eq!(declared_format("data:image/;base64,AAAA"), None);
        assert_eq!(declared_format("AAAA"), None);
    }

    /// Splice an APP1 Exif segment carrying `orientation` right after SOI.
    fn with_exif_orientation(jpeg: &[u8], orientation: u8) -> Vec<u8> {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"MM\x00\x2a\x00\x00\x00\x08");
        tiff.extend_from_slice(&[0x00, 0x01]);
        // Tag 0x0112, SHORT, count 1, value left-justified.
        tiff.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        tiff.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
        tiff.extend_from_slice(&[0x00; 4]);

        let mut payload = b"Exif\x00\x00".to_vec();
        payload.extend_from_slice(&tiff);
        let len = (payload.len() + 2) as u16;

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xff, 0xe1]);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn test_exif_orientation_applied() {
        let jpeg = encode(&gradient(40, 20), ImageFormat::Jpeg);
        assert_eq!(&jpeg[..2], &[0xff, 0xd8]);

        let plain = decode_bytes(&jpeg).unwrap();
        assert_eq!((plain.width(), plain.height()), (40, 20));

        // Orientation 6: rotate 90 degrees clockwise to display upright.
        let rotated = decode(&STANDARD.encode(with_exif_orientation(&jpeg, 6))).unwrap();
        assert_eq!((rotated.width(), rotated.height()), (20, 40));
    }

    #[test]
    fn test_strip_data_uri_is_greedy() {
        assert_eq!(strip_data_uri("data:image/x;base64,;base64,QUJD"), "QUJD");
    }

    #[test]
    fn test_decode_png_dimensions() {
        let png = encode(&gradient(37, 21), ImageFormat::Png);
        let grid = decode(&STANDARD.encode(&png)).unwrap();
        assert_eq!((grid.width(), grid.height()), (37, 21));
        // PNG is lossless: first pixel (R=0, G=0, B=128) comes back as BGR.
        assert_eq!(grid.pixel(0, 0), [128, 0, 0]);
    }

    #[test]
    fn test_decode_with_data_uri_prefix() {
        let png = encode(&gradient(8, 8), ImageFormat::Png);
        let payload = format!("data:image/png;base64,{}", STANDARD.encode(&png));
        assert!(decode(&payload).is_ok());
    }

    #[test]
    fn test_declared_format_is_not_trusted() {
        let png = encode(&gradient(8, 8), ImageFormat::Png);
        let payload = format!("data:image/jpeg;base64,{}", STANDARD.encode(&png));
        let grid = decode(&payload).unwrap();
        assert_eq!(grid.width(), 8);
    }

    #[test]
    fn test_decode_line_wrapped_base64() {
        let png = encode(&gradient(8, 8), ImageFormat::Png);
        let encoded = STANDARD.encode(&png);
        let wrapped: String = encoded
            .as_bytes()
            .chunks(16)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        assert!(decode(&wrapped).is_ok());
    }

    #[test]
    fn test_decode_reencode_keeps_dimensions() {
        for format in [ImageFormat::Png, ImageFormat::Jpeg] {
            let original = encode(&gradient(64, 40), format);
            let first = decode(&STANDARD.encode(&original)).unwrap();
            let second = decode(&STANDARD.encode(&original)).unwrap();
            assert_eq!(first, second, "{format:?} decode must be deterministic");

            let rgb = RgbImage::from_fn(first.width(), first.height(), |x, y| {
                let [b, g, r] = first.pixel(x, y);
                Rgb([r, g, b])
            });
            let again = decode(&STANDARD.encode(encode(&rgb, format))).unwrap();
            assert_eq!((again.width(), again.height()), (first.width(), first.height()));
        }
    }

    #[test]
    fn test_malformed_base64() {
        assert!(matches!(
            decode("this is *not* base64!"),
            Err(DecodeError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_empty_payload_is_invalid_image() {
        assert!(matches!(decode(""), Err(DecodeError::InvalidImage(_))));
        assert!(matches!(decode_bytes(&[]), Err(DecodeError::InvalidImage(_))));
    }

    #[test]
    fn test_non_image_bytes() {
        let payload = STANDARD.encode(b"just some text, definitely not an image");
        assert!(matches!(decode(&payload), Err(DecodeError::InvalidImage(_))));
    }

    #[test]
    fn test_truncated_png() {
        let png = encode(&gradient(32, 32), ImageFormat::Png);
        let truncated = &png[..png.len() / 2];
        assert!(matches!(
            decode_bytes(truncated),
            Err(DecodeError::InvalidImage(_))
        ));
    }
}
