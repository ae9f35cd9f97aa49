//! A deterministic, in-memory [`MediaSource`].
//!
//! [`SyntheticSource`] renders solid-colour "scenes" on a fixed timeline and
//! can be scripted to misbehave the way real players do: seeks that never
//! settle, seeks that error past a point, clamping at the end of the media,
//! missing duration metadata. It backs the crate's tests and benchmarks and
//! is handy for exercising a custom [`EventCallback`](crate::EventCallback)
//! without a video file.
//!
//! # Example
//!
//! ```
//! use video2ppt::{ExtractOptions, SlideExtractor, SyntheticSource};
//!
//! # async fn example() -> Result<(), video2ppt::Video2PptError> {
//! let mut source = SyntheticSource::new(300.0)
//!     .with_scene(0.0, [0, 0, 0, 255])
//!     .with_scene(60.0, [255, 255, 255, 255]);
//!
//! let slides = SlideExtractor::new(ExtractOptions::new().with_threshold(20.0))
//!     .extract(&mut source)
//!     .await?;
//! assert_eq!(slides.len(), 2);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use image::{Rgba, RgbaImage};

use crate::error::Video2PptError;
use crate::format::ContainerFormat;
use crate::frame::Frame;
use crate::source::MediaSource;

const DEFAULT_WIDTH: u32 = 32;
const DEFAULT_HEIGHT: u32 = 18;

/// How the source answers a seek.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekFault {
    /// Seeks at or beyond `from` seconds never settle.
    HangFrom(f64),
    /// Seeks at or beyond `from` seconds are rejected.
    FailFrom(f64),
    /// Seeks past the end of the media are rejected instead of clamped.
    RejectPastEnd,
}

/// Scripted in-memory video.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    duration: f64,
    width: u32,
    height: u32,
    scenes: Vec<(f64, [u8; 4])>,
    noise: u8,
    position: f64,
    faults: Vec<SeekFault>,
    seek_latency: Option<Duration>,
    capture_fails_from: Option<f64>,
    buffered_end: Option<f64>,
    declared_duration: Option<f64>,
    format: ContainerFormat,
    seek_count: u64,
    capture_count: u64,
    sessions_ended: u64,
}

impl SyntheticSource {
    /// A mid-grey video lasting `duration` seconds that seeks instantly and
    /// clamps seeks past its end.
    pub fn new(duration: f64) -> Self {
        Self {
            duration: duration.max(0.0),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            scenes: Vec::new(),
            noise: 0,
            position: 0.0,
            faults: Vec::new(),
            seek_latency: None,
            capture_fails_from: None,
            buffered_end: None,
            declared_duration: None,
            format: ContainerFormat::Unknown,
            seek_count: 0,
            capture_count: 0,
            sessions_ended: 0,
        }
    }

    /// Frame dimensions.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Show `color` from `start` seconds until the next scene begins.
    #[must_use]
    pub fn with_scene(mut self, start: f64, color: [u8; 4]) -> Self {
        self.scenes.push((start, color));
        self.scenes.sort_by(|a, b| a.0.total_cmp(&b.0));
        self
    }

    /// Perturb every pixel by a deterministic offset in `0..amplitude`
    /// that changes from one position to the next.
    #[must_use]
    pub fn with_noise(mut self, amplitude: u8) -> Self {
        self.noise = amplitude;
        self
    }

    /// Add a seek fault.
    #[must_use]
    pub fn with_fault(mut self, fault: SeekFault) -> Self {
        self.faults.push(fault);
        self
    }

    /// Every seek takes `latency` to settle.
    #[must_use]
    pub fn with_seek_latency(mut self, latency: Duration) -> Self {
        self.seek_latency = Some(latency);
        self
    }

    /// Captures at or beyond `from` seconds fail.
    #[must_use]
    pub fn with_capture_failures_from(mut self, from: f64) -> Self {
        self.capture_fails_from = Some(from);
        self
    }

    /// Report a buffered range ending at `end` seconds.
    #[must_use]
    pub fn with_buffered_end(mut self, end: f64) -> Self {
        self.buffered_end = Some(end);
        self
    }

    /// Report a container duration.
    #[must_use]
    pub fn with_declared_duration(mut self, duration: f64) -> Self {
        self.declared_duration = Some(duration);
        self
    }

    /// Container format reported to the extractor.
    #[must_use]
    pub fn with_format(mut self, format: ContainerFormat) -> Self {
        self.format = format;
        self
    }

    /// Start playback somewhere other than zero.
    #[must_use]
    pub fn with_position(mut self, position: f64) -> Self {
        self.position = position.clamp(0.0, self.duration);
        self
    }

    /// True length of the media in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Number of seeks requested so far.
    pub fn seek_count(&self) -> u64 {
        self.seek_count
    }

    /// Number of successful captures so far.
    pub fn capture_count(&self) -> u64 {
        self.capture_count
    }

    /// Number of times [`MediaSource::end_session`] was called.
    pub fn sessions_ended(&self) -> u64 {
        self.sessions_ended
    }

    fn scene_color(&self, position: f64) -> [u8; 4] {
        self.scenes
            .iter()
            .take_while(|(start, _)| *start <= position)
            .last()
            .map(|(_, color)| *color)
            .unwrap_or([128, 128, 128, 255])
    }

    fn render(&self, position: f64) -> RgbaImage {
        let base = self.scene_color(position);
        if self.noise == 0 {
            return RgbaImage::from_pixel(self.width, self.height, Rgba(base));
        }

        let tick = (position * 10.0).round() as u64;
        let amplitude = u64::from(self.noise);
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let mut seed = tick
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(u64::from(x) * 1_442_695_040_888_963_407)
                .wrapping_add(u64::from(y) * 2_862_933_555_777_941_757);
            seed ^= seed >> 33;
            let offset = (seed % amplitude) as u8;
            Rgba([
                base[0].saturating_add(offset),
                base[1].saturating_add(offset),
                base[2].saturating_add(offset),
                base[3],
            ])
        })
    }
}

impl MediaSource for SyntheticSource {
    fn position(&self) -> f64 {
        self.position
    }

    async fn seek(&mut self, target: f64) -> Result<f64, Video2PptError> {
        self.seek_count += 1;

        for fault in &self.faults {
            match *fault {
                SeekFault::HangFrom(from) if target >= from => {
                    std::future::pending::<()>().await;
                }
                SeekFault::FailFrom(from) if target >= from => {
                    return Err(Video2PptError::SeekFailed {
                        target,
                        reason: "source refused the seek".to_string(),
                    });
                }
                SeekFault::RejectPastEnd if target > self.duration => {
                    return Err(Video2PptError::SeekFailed {
                        target,
                        reason: "target is past the end of the media".to_string(),
                    });
                }
                _ => {}
            }
        }

        if let Some(latency) = self.seek_latency {
            tokio::time::sleep(latency).await;
        }

        self.position = target.clamp(0.0, self.duration);
        Ok(self.position)
    }

    fn capture(&mut self) -> Result<Frame, Video2PptError> {
        if self
            .capture_fails_from
            .is_some_and(|from| self.position >= from)
        {
            return Err(Video2PptError::CaptureFailed(format!(
                "no decodable frame at {:.2}s",
                self.position
            )));
        }

        self.capture_count += 1;
        Ok(Frame::new(
            self.render(self.position),
            Duration::from_secs_f64(self.position),
        ))
    }

    fn buffered_end(&self) -> Option<f64> {
        self.buffered_end
    }

    fn declared_duration(&self) -> Option<f64> {
        self.declared_duration
    }

    fn format(&self) -> ContainerFormat {
        self.format
    }

    fn end_session(&mut self) {
        self.sessions_ended += 1;
    }
}
