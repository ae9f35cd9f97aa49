//! Captured video frames.

use std::time::Duration;

use image::{Rgba, RgbaImage};

use crate::error::Video2PptError;

/// A single RGBA frame captured at a position on the video timeline.
///
/// Frames are created per sample and never mutated; the extractor drops
/// them once they have been scored (and encoded, if accepted).
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbaImage,
    timestamp: Duration,
}

impl Frame {
    /// Wrap an already decoded image.
    pub fn new(image: RgbaImage, timestamp: Duration) -> Self {
        Self { image, timestamp }
    }

    /// Build a frame from a tightly packed RGBA buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Video2PptError::CaptureFailed`] if the buffer length does
    /// not match `width * height * 4`.
    pub fn from_rgba(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        timestamp: Duration,
    ) -> Result<Self, Video2PptError> {
        let image = RgbaImage::from_raw(width, height, pixels).ok_or_else(|| {
            Video2PptError::CaptureFailed(format!(
                "pixel buffer does not describe a {width}x{height} RGBA image"
            ))
        })?;
        Ok(Self { image, timestamp })
    }

    /// A frame filled with one colour.
    pub fn filled(width: u32, height: u32, color: [u8; 4], timestamp: Duration) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba(color)),
            timestamp,
        }
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Position on the timeline the frame was captured at.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Borrow the pixel data.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Consume the frame, returning the pixel data.
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Luminance RMS difference against another frame.
    ///
    /// See [`luminance_rms`](crate::luminance_rms).
    pub fn difference(&self, other: &Frame) -> Result<f64, Video2PptError> {
        crate::difference::luminance_rms(&self.image, &other.image)
    }
}
