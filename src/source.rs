//! The media-source abstraction.
//!
//! Everything above the decoder talks to a video through [`MediaSource`]: a
//! seekable element with a playback position that can draw its current
//! frame. The FFmpeg backend ([`FfmpegSource`](crate::FfmpegSource), feature
//! `ffmpeg`) and the deterministic [`SyntheticSource`](crate::SyntheticSource)
//! both implement it.

use std::future::Future;
use std::time::Duration;

use crate::error::Video2PptError;
use crate::format::ContainerFormat;
use crate::frame::Frame;

/// A seekable video whose current frame can be captured.
///
/// Seeks are asynchronous: the returned future resolves once the source has
/// settled on a new position, yielding that position in seconds. A source
/// may land somewhere other than the requested target (clamping at the end
/// of the media, snapping to a keyframe). A seek that never settles must
/// simply stay pending; callers bound every seek with a timeout.
pub trait MediaSource {
    /// Current playback position in seconds.
    fn position(&self) -> f64;

    /// Seek to `target` seconds, resolving to the settled position.
    fn seek(&mut self, target: f64) -> impl Future<Output = Result<f64, Video2PptError>>;

    /// Draw the frame at the current position.
    fn capture(&mut self) -> Result<Frame, Video2PptError>;

    /// End of the last buffered range in seconds, if the source buffers.
    fn buffered_end(&self) -> Option<f64> {
        None
    }

    /// Duration declared by the container, if any.
    ///
    /// Never trusted as an estimate: some containers omit or misreport it.
    /// Only used to bound open-horizon sampling.
    fn declared_duration(&self) -> Option<f64> {
        None
    }

    /// Container format, used to tune probe confidences and calibration.
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Unknown
    }

    /// Called once when an extraction session ends, whatever the outcome.
    fn end_session(&mut self) {}
}

/// Seek with a deadline.
///
/// # Errors
///
/// Returns [`Video2PptError::SeekTimeout`] if the seek has not settled when
/// `timeout` elapses, or the source's own error if it rejects the seek.
pub async fn seek_with_timeout<S: MediaSource>(
    source: &mut S,
    target: f64,
    timeout: Duration,
) -> Result<f64, Video2PptError> {
    match tokio::time::timeout(timeout, source.seek(target)).await {
        Ok(result) => result,
        Err(_) => Err(Video2PptError::SeekTimeout { target, timeout }),
    }
}

/// Best-effort seek back to `position`.
///
/// Failures are logged and otherwise ignored.
pub(crate) async fn restore_position<S: MediaSource>(
    source: &mut S,
    position: f64,
    timeout: Duration,
) {
    if let Err(error) = seek_with_timeout(source, position, timeout).await {
        log::warn!("Could not restore playback position {position:.2}s: {error}");
    }
}
