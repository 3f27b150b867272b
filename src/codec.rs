//! Frame encoding helpers for the WebSocket protocol
//!
//! Viewers exchange frames as base64 data URLs.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};

use crate::error::{PrismaError, Result};

/// Decode a `data:image/...;base64,` URL (or bare base64) into an RGB frame
pub fn decode_data_url(data_url: &str) -> Result<RgbImage> {
    let payload = match data_url.split_once(',') {
        Some((header, payload)) => {
            if !header.starts_with("data:") || !header.ends_with(";base64") {
                return Err(PrismaError::Decode(format!(
                    "unsupported data URL header: {}",
                    header
                )));
            }
            payload
        }
        None => data_url,
    };

    let bytes = STANDARD.decode(payload.trim())?;
    if bytes.is_empty() {
        return Err(PrismaError::Decode("empty frame payload".to_string()));
    }

    let image = image::load_from_memory(&bytes)?;
    Ok(image.to_rgb8())
}

/// Encode an RGB frame as a JPEG data URL
pub fn encode_jpeg_data_url(frame: &RgbImage, quality: u8) -> Result<String> {
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    encoder.encode_image(frame)?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&buffer)))
}

/// Encode an image as PNG bytes
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, ImageFormat::Png)?;
    Ok(cursor.into_inner())
}

/// Encode an RGB image as bare base64 PNG (diffusion service payloads)
pub fn encode_png_base64(frame: &RgbImage) -> Result<String> {
    let png = encode_png(&DynamicImage::ImageRgb8(frame.clone()))?;
    Ok(STANDARD.encode(png))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_jpeg_data_url_decodes_to_same_size() {
        let frame = RgbImage::from_pixel(32, 24, Rgb([200, 30, 30]));
        let url = encode_jpeg_data_url(&frame, 90).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));

        let decoded = decode_data_url(&url).unwrap();
        assert_eq!(decoded.dimensions(), (32, 24));
        let px = decoded.get_pixel(16, 12);
        assert!(px[0] > 150 && px[1] < 80);
    }

    #[test]
    fn test_bare_base64_png() {
        let frame = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
        let b64 = encode_png_base64(&frame).unwrap();
        let decoded = decode_data_url(&b64).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            decode_data_url("data:image/jpeg;base64,!!!"),
            Err(PrismaError::Decode(_))
        ));
        assert!(decode_data_url("data:text/plain,hello").is_err());
        assert!(decode_data_url("data:image/png;base64,").is_err());
    }
}
