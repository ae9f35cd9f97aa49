//! Luminance-weighted frame difference.
//!
//! The metric converts every pixel to relative luminance
//! (`0.2126 R + 0.7152 G + 0.0722 B`), takes the per-pixel delta between the
//! two frames and returns the root mean square of those deltas. Identical
//! frames score `0.0`; a black frame against a white frame scores `255.0`.
//!
//! With the `rayon` feature enabled the row sums are computed in parallel.
//! The result is the same sum up to floating-point reassociation.

use image::RgbaImage;

use crate::error::Video2PptError;

const RED_WEIGHT: f64 = 0.2126;
const GREEN_WEIGHT: f64 = 0.7152;
const BLUE_WEIGHT: f64 = 0.0722;

/// Relative luminance of one RGBA pixel. Alpha is ignored.
#[inline]
pub fn luminance(pixel: &[u8]) -> f64 {
    RED_WEIGHT * f64::from(pixel[0])
        + GREEN_WEIGHT * f64::from(pixel[1])
        + BLUE_WEIGHT * f64::from(pixel[2])
}

/// Root mean square of the per-pixel luminance delta between two frames.
///
/// # Errors
///
/// Returns [`Video2PptError::FrameSizeMismatch`] when the frames do not have
/// the same dimensions.
///
/// # Example
///
/// ```
/// use image::{Rgba, RgbaImage};
/// use video2ppt::luminance_rms;
///
/// let black = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
/// let white = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
///
/// assert_eq!(luminance_rms(&black, &black)?, 0.0);
/// assert!((luminance_rms(&black, &white)? - 255.0).abs() < 1e-9);
/// # Ok::<(), video2ppt::Video2PptError>(())
/// ```
pub fn luminance_rms(left: &RgbaImage, right: &RgbaImage) -> Result<f64, Video2PptError> {
    if left.dimensions() != right.dimensions() {
        return Err(Video2PptError::FrameSizeMismatch {
            left_width: left.width(),
            left_height: left.height(),
            right_width: right.width(),
            right_height: right.height(),
        });
    }

    let pixel_count = u64::from(left.width()) * u64::from(left.height());
    if pixel_count == 0 {
        return Ok(0.0);
    }

    let row_bytes = left.width() as usize * 4;
    let sum = squared_delta_sum(left.as_raw(), right.as_raw(), row_bytes);
    Ok((sum / pixel_count as f64).sqrt())
}

fn row_squared_delta(left: &[u8], right: &[u8]) -> f64 {
    left.chunks_exact(4)
        .zip(right.chunks_exact(4))
        .map(|(a, b)| {
            let delta = luminance(a) - luminance(b);
            delta * delta
        })
        .sum()
}

#[cfg(not(feature = "rayon"))]
fn squared_delta_sum(left: &[u8], right: &[u8], row_bytes: usize) -> f64 {
    left.chunks(row_bytes)
        .zip(right.chunks(row_bytes))
        .map(|(a, b)| row_squared_delta(a, b))
        .sum()
}

#[cfg(feature = "rayon")]
fn squared_delta_sum(left: &[u8], right: &[u8], row_bytes: usize) -> f64 {
    use rayon::prelude::*;

    left.par_chunks(row_bytes)
        .zip(right.par_chunks(row_bytes))
        .map(|(a, b)| row_squared_delta(a, b))
        .sum()
}
