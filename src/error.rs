//! Error types for the `video2ppt` crate.
//!
//! This module defines [`Video2PptError`], the unified error type returned by
//! all fallible operations in the crate. Per-sample failures (seek timeouts,
//! failed captures, encoder errors) are absorbed by the sampler and the
//! extractor; only session-level failures reach the caller.

use std::{io::Error as IoError, time::Duration};

#[cfg(feature = "ffmpeg")]
use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use serde_json::Error as JsonError;
use thiserror::Error;
use zip::result::ZipError;

/// The unified error type for all `video2ppt` operations.
///
/// Every public method that can fail returns `Result<T, Video2PptError>`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Video2PptError {
    /// A seek did not settle before its deadline.
    #[error("Seek to {target:.2}s did not settle within {timeout:?}")]
    SeekTimeout {
        /// Requested position in seconds.
        target: f64,
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// The media source rejected a seek.
    #[error("Seek to {target:.2}s failed: {reason}")]
    SeekFailed {
        /// Requested position in seconds.
        target: f64,
        /// Reason reported by the source.
        reason: String,
    },

    /// Too many samples were skipped for the session to be trusted.
    #[error("Skipped {skipped} of {attempted} samples, aborting extraction")]
    SkipRatioExceeded {
        /// Samples that could not be captured.
        skipped: u64,
        /// Samples attempted so far.
        attempted: u64,
    },

    /// No duration estimation strategy produced a usable result.
    #[error("Video duration could not be determined")]
    DurationUndetectable,

    /// A frame could not be encoded as JPEG.
    #[error("Failed to encode frame: {0}")]
    EncodeFailure(String),

    /// Two frames with different dimensions were compared.
    #[error("Cannot compare a {left_width}x{left_height} frame with a {right_width}x{right_height} frame")]
    FrameSizeMismatch {
        /// Width of the first frame.
        left_width: u32,
        /// Height of the first frame.
        left_height: u32,
        /// Width of the second frame.
        right_width: u32,
        /// Height of the second frame.
        right_height: u32,
    },

    /// The media source could not produce pixels for the current position.
    #[error("Failed to capture frame: {0}")]
    CaptureFailed(String),

    /// Sampling finished without a single captured frame.
    #[error("No frames could be captured from the video")]
    NoFramesCaptured,

    /// An interval or step value of zero (or a non-finite value) was provided.
    #[error("Interval must be a positive number of seconds")]
    InvalidInterval,

    /// A configuration value is out of range.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// The background thread serving a blocking media source has exited.
    #[error("Media worker stopped: {0}")]
    WorkerStopped(String),

    /// A deck was requested for an empty slide set.
    #[error("Cannot build a deck without slides")]
    EmptyDeck,

    /// The presentation could not be written or read back.
    #[error("Deck serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during frame conversion or encoding.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// An error from the `zip` crate while packaging a deck.
    #[error("Archive error: {0}")]
    ZipError(#[from] ZipError),

    /// A settings file could not be parsed.
    #[error("Settings error: {0}")]
    JsonError(#[from] JsonError),

    /// An error originating from the FFmpeg libraries.
    #[cfg(feature = "ffmpeg")]
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),
}

impl Video2PptError {
    /// Whether the error only affects a single sample and the session may
    /// continue.
    pub fn is_per_sample(&self) -> bool {
        matches!(
            self,
            Video2PptError::SeekTimeout { .. }
                | Video2PptError::SeekFailed { .. }
                | Video2PptError::CaptureFailed(_)
                | Video2PptError::EncodeFailure(_)
        )
    }
}

#[cfg(feature = "ffmpeg")]
impl From<FfmpegError> for Video2PptError {
    fn from(error: FfmpegError) -> Self {
        Video2PptError::FfmpegError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_capture_and_encode_failures_are_per_sample() {
        let per_sample = [
            Video2PptError::SeekTimeout {
                target: 3.0,
                timeout: Duration::from_secs(3),
            },
            Video2PptError::SeekFailed {
                target: 3.0,
                reason: "refused".to_string(),
            },
            Video2PptError::CaptureFailed("blank".to_string()),
            Video2PptError::EncodeFailure("zero-sized".to_string()),
        ];
        for error in &per_sample {
            assert!(error.is_per_sample(), "{error}");
        }
    }

    #[test]
    fn session_failures_are_not_per_sample() {
        let session = [
            Video2PptError::SkipRatioExceeded {
                skipped: 6,
                attempted: 11,
            },
            Video2PptError::FrameSizeMismatch {
                left_width: 4,
                left_height: 4,
                right_width: 8,
                right_height: 8,
            },
            Video2PptError::NoFramesCaptured,
            Video2PptError::Cancelled,
            Video2PptError::WorkerStopped("gone".to_string()),
            Video2PptError::IoError(IoError::other("disk")),
        ];
        for error in &session {
            assert!(!error.is_per_sample(), "{error}");
        }
    }
}
