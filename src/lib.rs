//! # video2ppt
//!
//! Turn a recorded lecture or screen-share into a slide deck.
//!
//! `video2ppt` samples frames from a video at a fixed interval, keeps the
//! ones that differ enough from the last kept frame, and packages them as a
//! 16:9 PowerPoint deck, one full-bleed image per slide. It is built for
//! sources that behave badly: missing or wrong durations, seeks that hang,
//! seeks that fail past some point. Every seek runs under a deadline, failed
//! samples are retried with jitter, and a session that skips too much stops
//! with a clear error instead of a silent, half-empty deck.
//!
//! ## Quick Start
//!
//! ```no_run
//! use video2ppt::{DeckBuilder, ExtractOptions, SlideExtractor, SyntheticSource};
//!
//! # async fn example() -> Result<(), video2ppt::Video2PptError> {
//! // With the `ffmpeg` feature: `video2ppt::FfmpegSource::open("lecture.mp4").await?`
//! let mut source = SyntheticSource::new(600.0)
//!     .with_scene(0.0, [0, 0, 0, 255])
//!     .with_scene(120.0, [255, 255, 255, 255]);
//!
//! let extractor = SlideExtractor::new(ExtractOptions::new().with_capture_interval(5.0));
//! let slides = extractor.extract(&mut source).await?;
//!
//! let deck = DeckBuilder::new().build(&slides)?;
//! deck.save_in(".")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! An extraction session runs in phases, reported through
//! [`ExtractionEvent`]s:
//!
//! 1. **Duration estimation** ([`DurationEstimator`]): several probes
//!    (seek to a huge time, binary search, buffered range, a ladder of large
//!    seeks) are reconciled into one [`DurationEstimate`] with a confidence.
//! 2. **Threshold calibration** ([`ThresholdCalibrator`]): consecutive
//!    sampled frames are compared and a robust statistic of the differences
//!    becomes the change threshold. Skipped when a fixed threshold is set.
//! 3. **Sampling** ([`SlideExtractor`]): frames at every capture interval
//!    are scored with [`luminance_rms`] against the last accepted frame and
//!    kept when the score reaches the threshold.
//!
//! Any seekable video can be plugged in through [`MediaSource`]; decoders
//! that block go through [`BlockingSource`] so their seeks can time out.
//! [`SyntheticSource`] is a deterministic in-memory source with scripted
//! scenes and faults, handy for tests.
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ffmpeg` | [`FfmpegSource`] for local video files, and the `video2ppt` binary |
//! | `rayon` | Parallel row sums in the difference metric |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! The `ffmpeg` feature needs the FFmpeg development libraries installed
//! on the system.

pub mod blocking;
pub mod configuration;
pub mod deck;
pub mod difference;
pub mod duration;
pub mod encode;
pub mod error;
pub mod extractor;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod format;
pub mod frame;
pub mod logging;
pub mod plan;
pub mod progress;
pub mod sampler;
pub mod slides;
pub mod source;
pub mod synthetic;
pub mod threshold;
#[cfg(feature = "ffmpeg")]
mod utilities;

pub use blocking::{BlockingMedia, BlockingSource, MediaInfo};
pub use configuration::{ExtractOptions, ExtractSettings, MAX_SLIDES};
pub use deck::{Deck, DeckBuilder, read_deck_images, suggested_file_name};
pub use difference::{luminance, luminance_rms};
pub use duration::{
    DurationEstimate, DurationEstimator, DurationMethod, ProbeConfig, select_estimate,
};
pub use encode::{DEFAULT_JPEG_QUALITY, encode_jpeg};
pub use error::Video2PptError;
pub use extractor::{
    ExtractionPhase, ExtractionReport, SlideExtractor, SlideVerdict, judge_frame,
};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::{FfmpegLogLevel, FfmpegSource, set_ffmpeg_log_level};
pub use format::ContainerFormat;
pub use frame::Frame;
pub use logging::SessionLog;
pub use plan::{CalibrationSchedule, Horizon, SamplingPlan, SamplingStrategy};
pub use progress::{
    CancellationToken, EventCallback, EventStream, ExtractionEvent, event_channel,
};
pub use sampler::{FrameSampler, SampleCounters, SampleOutcome, SeekPolicy, SkipGuard};
pub use slides::{Slide, SlideSet};
pub use source::{MediaSource, seek_with_timeout};
pub use synthetic::{SeekFault, SyntheticSource};
pub use threshold::{
    Calibration, ThresholdBand, ThresholdCalibrator, threshold_from_differences,
};
