//! Payload encoding: unit payload → base64 attachment for a vision request.
//!
//! VLM APIs accept images as base64 data embedded in the JSON request body.
//! PNG is chosen over JPEG because it is lossless; JPEG artefacts around
//! glyph edges measurably hurt recognition at low DPI.

use crate::model::Payload;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a raster image as a base64 PNG.
///
/// `detail: "high"` lets GPT-4-class models tile the image instead of
/// reading a single 512 px overview, which loses fine print.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Wrap raw PDF bytes for providers that read documents natively.
pub fn encode_pdf(bytes: &[u8]) -> ImageData {
    ImageData::new(STANDARD.encode(bytes), "application/pdf")
}

/// Encode whichever payload the unit carries.
pub fn encode_payload(payload: &Payload) -> Result<ImageData, image::ImageError> {
    match payload {
        Payload::Image(img) => encode_image(img),
        Payload::Pdf(bytes) => Ok(encode_pdf(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::sync::Arc;

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_image(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert!(decoded.starts_with(b"\x89PNG"));
    }

    #[test]
    fn encode_pdf_payload() {
        let payload = Payload::Pdf(Arc::from(&b"%PDF-1.7"[..]));
        let data = encode_payload(&payload).unwrap();
        assert_eq!(data.mime_type, "application/pdf");
        assert_eq!(STANDARD.decode(&data.data).unwrap(), b"%PDF-1.7");
    }
}
