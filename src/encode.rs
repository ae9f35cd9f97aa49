//! JPEG encoding of accepted frames.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, codecs::jpeg::JpegEncoder};

use crate::error::Video2PptError;
use crate::frame::Frame;

/// Quality used for slide images.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Encode a frame as JPEG. Alpha is dropped.
///
/// # Errors
///
/// Returns [`Video2PptError::EncodeFailure`] if the encoder rejects the
/// frame (for example, a zero-sized image).
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Arc<[u8]>, Video2PptError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(Video2PptError::EncodeFailure(format!(
            "cannot encode a {}x{} frame",
            frame.width(),
            frame.height()
        )));
    }

    let rgb = DynamicImage::ImageRgba8(frame.image().clone()).into_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|error| Video2PptError::EncodeFailure(error.to_string()))?;
    Ok(Arc::from(buffer.into_inner()))
}
