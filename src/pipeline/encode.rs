//! Image encoding: [`RasterFrame`] → PNG bytes.
//!
//! PNG is lossless: rendered text stays crisp at thumbnail size where JPEG
//! would smear it with ringing artefacts.

use crate::error::PdfThumbError;
use crate::pipeline::render::RasterFrame;
use bytes::Bytes;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Compressed image bytes plus their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Bytes,
    pub content_type: &'static str,
}

impl EncodedImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Serialise a rendered frame as PNG.
pub fn encode_png(frame: RasterFrame) -> Result<EncodedImage, PdfThumbError> {
    let img = DynamicImage::ImageRgba8(frame.into_image());
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PdfThumbError::EncodeFailed(e.to_string()))?;

    debug!("Encoded thumbnail → {} bytes PNG", buf.len());

    Ok(EncodedImage {
        bytes: Bytes::from(buf),
        content_type: PNG_CONTENT_TYPE,
    })
}
