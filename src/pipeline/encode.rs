//! Image encoding: `DynamicImage` → base64 PNG data URL.
//!
//! The OCR endpoint accepts images as `data:` URLs embedded in the JSON
//! request body. PNG is used over JPEG because it is lossless — text
//! crispness matters far more than file size for OCR accuracy, and JPEG
//! artefacts around rendered glyphs measurably degrade recognition.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page as a `data:image/png;base64,…` URL.
pub fn encode_page(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page image → {} base64 bytes", b64.len());

    Ok(format!("data:image/png;base64,{}", b64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let url = encode_page(&img).expect("encode should succeed");
        assert!(url.starts_with("data:image/png;base64,"));

        let payload = url.strip_prefix("data:image/png;base64,").unwrap();
        let decoded = STANDARD.decode(payload).expect("valid base64");
        // PNG signature
        assert!(decoded.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}
