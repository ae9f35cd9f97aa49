//! The slide extraction state machine.
//!
//! A run moves through
//! `Idle → EstimatingDuration → CalibratingThreshold → Sampling → Complete`,
//! or to `Failed` from any non-terminal phase. Sampling walks the timeline in
//! fixed steps. The first captured frame is always a slide. Every later frame
//! is compared with the last *accepted* slide rather than the previous
//! sample, so slow drift (a scrolling page) still adds up to a new slide.
//!
//! # Example
//!
//! ```
//! use video2ppt::{ExtractOptions, SlideExtractor, SyntheticSource};
//!
//! # async fn example() -> Result<(), video2ppt::Video2PptError> {
//! let mut source = SyntheticSource::new(120.0)
//!     .with_scene(0.0, [20, 20, 20, 255])
//!     .with_scene(45.0, [240, 240, 240, 255]);
//!
//! let report = SlideExtractor::new(ExtractOptions::new())
//!     .extract_with_report(&mut source)
//!     .await?;
//! println!(
//!     "{} slides, threshold {:.1}, duration {:.1}s",
//!     report.slides.len(),
//!     report.threshold,
//!     report.estimate.seconds
//! );
//! # Ok(())
//! # }
//! ```

use std::ops::{Deref, DerefMut};

use serde::Serialize;

use crate::configuration::{ExtractOptions, ExtractSettings};
use crate::duration::{DurationEstimate, DurationEstimator};
use crate::encode::encode_jpeg;
use crate::error::Video2PptError;
use crate::frame::Frame;
use crate::logging::SessionLog;
use crate::plan::Horizon;
use crate::progress::{EventEmitter, ExtractionEvent};
use crate::sampler::{FrameSampler, SampleCounters, SampleOutcome};
use crate::slides::{Slide, SlideSet};
use crate::source::MediaSource;
use crate::threshold::Calibration;

/// Phase of an extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionPhase {
    Idle,
    EstimatingDuration,
    CalibratingThreshold,
    Sampling,
    Complete,
    Failed,
}

impl ExtractionPhase {
    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: ExtractionPhase) -> bool {
        use ExtractionPhase::*;

        matches!(
            (self, next),
            (Idle, EstimatingDuration)
                | (EstimatingDuration, CalibratingThreshold)
                | (CalibratingThreshold, Sampling)
                | (Sampling, Complete)
                | (Idle | EstimatingDuration | CalibratingThreshold | Sampling, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExtractionPhase::Complete | ExtractionPhase::Failed)
    }
}

/// How a sampled frame fares against the last accepted slide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlideVerdict {
    /// Becomes a slide. `score` is `None` for the first slide.
    Accept { score: Option<f64> },
    /// Too similar to the last slide.
    Reject { score: f64 },
    /// Not later than the last slide.
    Stale,
}

/// Decide whether `frame` becomes the next slide.
///
/// # Errors
///
/// Returns [`Video2PptError::FrameSizeMismatch`] if the frame and the last
/// slide differ in size.
pub fn judge_frame(
    last_accepted: Option<&Frame>,
    frame: &Frame,
    threshold: f64,
) -> Result<SlideVerdict, Video2PptError> {
    let Some(last) = last_accepted else {
        return Ok(SlideVerdict::Accept { score: None });
    };
    if frame.timestamp() <= last.timestamp() {
        return Ok(SlideVerdict::Stale);
    }

    let score = last.difference(frame)?;
    if score >= threshold {
        Ok(SlideVerdict::Accept { score: Some(score) })
    } else {
        Ok(SlideVerdict::Reject { score })
    }
}

/// Everything a successful run learned.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub slides: SlideSet,
    pub estimate: DurationEstimate,
    /// `None` when a fixed threshold was configured.
    pub calibration: Option<Calibration>,
    pub threshold: f64,
    /// Sampling-pass counters.
    #[serde(skip)]
    pub counters: SampleCounters,
}

/// Turns a [`MediaSource`] into a [`SlideSet`].
#[derive(Debug, Clone, Default)]
pub struct SlideExtractor {
    options: ExtractOptions,
}

impl SlideExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Run a full extraction and return the slides.
    ///
    /// The source is borrowed exclusively for the whole run, and
    /// [`MediaSource::end_session`] is called when the run ends, including
    /// when the returned future is dropped early.
    ///
    /// # Errors
    ///
    /// - [`Video2PptError::InvalidInterval`] / [`Video2PptError::InvalidOption`]
    ///   for unusable settings;
    /// - [`Video2PptError::SkipRatioExceeded`] when too many samples could not
    ///   be captured, or when nothing could be captured after some skips;
    /// - [`Video2PptError::NoFramesCaptured`] when the run ends empty;
    /// - [`Video2PptError::Cancelled`] when the cancellation token fires.
    pub async fn extract<S: MediaSource>(&self, source: &mut S) -> Result<SlideSet, Video2PptError> {
        self.extract_with_report(source)
            .await
            .map(|report| report.slides)
    }

    /// Like [`extract`](SlideExtractor::extract), also returning the duration
    /// estimate, calibration and counters.
    pub async fn extract_with_report<S: MediaSource>(
        &self,
        source: &mut S,
    ) -> Result<ExtractionReport, Video2PptError> {
        let mut source = SessionGuard(source);
        let mut session = ExtractionSession::new(&self.options);

        match session.run(&mut *source, &self.options).await {
            Ok(report) => {
                session.transition(ExtractionPhase::Complete);
                session.log.info(format_args!(
                    "extracted {} slides (threshold {:.2}, {} samples skipped)",
                    report.slides.len(),
                    report.threshold,
                    report.counters.skipped
                ));
                session
                    .emitter
                    .emit(ExtractionEvent::Completed(report.slides.clone()));
                Ok(report)
            }
            Err(error) => {
                session.transition(ExtractionPhase::Failed);
                session.log.warn(format_args!("extraction failed: {error}"));
                session.emitter.emit(ExtractionEvent::Failed(error.to_string()));
                Err(error)
            }
        }
    }
}

/// Ends the source's session however the run exits.
struct SessionGuard<'a, S: MediaSource>(&'a mut S);

impl<S: MediaSource> Deref for SessionGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.0
    }
}

impl<S: MediaSource> DerefMut for SessionGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.0
    }
}

impl<S: MediaSource> Drop for SessionGuard<'_, S> {
    fn drop(&mut self) {
        self.0.end_session();
    }
}

/// State owned by one run.
struct ExtractionSession {
    phase: ExtractionPhase,
    emitter: EventEmitter,
    log: SessionLog,
}

impl ExtractionSession {
    fn new(options: &ExtractOptions) -> Self {
        Self {
            phase: ExtractionPhase::Idle,
            emitter: EventEmitter::new(options.events.clone()),
            log: SessionLog::new(options.settings.debug_logging),
        }
    }

    fn transition(&mut self, next: ExtractionPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid phase transition {:?} -> {next:?}",
            self.phase
        );
        self.log
            .trace(format_args!("phase {:?} -> {next:?}", self.phase));
        self.phase = next;
        self.emitter.emit(ExtractionEvent::PhaseChanged(next));
    }

    fn check_cancelled(options: &ExtractOptions) -> Result<(), Video2PptError> {
        if options
            .cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
        {
            return Err(Video2PptError::Cancelled);
        }
        Ok(())
    }

    async fn run<S: MediaSource>(
        &mut self,
        source: &mut S,
        options: &ExtractOptions,
    ) -> Result<ExtractionReport, Video2PptError> {
        let settings = &options.settings;
        settings.validate()?;
        Self::check_cancelled(options)?;

        self.transition(ExtractionPhase::EstimatingDuration);
        let estimate = DurationEstimator::new()
            .with_config(options.probe.clone())
            .with_log(self.log.clone())
            .estimate(source)
            .await;
        if estimate.is_failed() {
            self.log.warn(format_args!(
                "{}, sampling at a fixed interval",
                Video2PptError::DurationUndetectable
            ));
        } else {
            self.log.info(format_args!(
                "duration {:.2}s via {:?} (confidence {:.2})",
                estimate.seconds, estimate.method, estimate.confidence
            ));
        }
        self.emitter
            .emit(ExtractionEvent::DurationDetected(estimate.clone()));

        let horizon = Horizon::for_estimate(
            &estimate,
            source.declared_duration(),
            settings.fallback_horizon,
            settings.fallback_end_skips,
        );

        self.transition(ExtractionPhase::CalibratingThreshold);
        Self::check_cancelled(options)?;
        let (threshold, calibration) = match settings.threshold {
            Some(threshold) => {
                self.emitter
                    .progress(ExtractionPhase::CalibratingThreshold, 100.0);
                (threshold, None)
            }
            None => {
                let calibrator = settings
                    .calibrator()
                    .with_seed(options.seed)
                    .with_log(self.log.clone());
                let emitter = &mut self.emitter;
                let calibration = calibrator
                    .calibrate(
                        source,
                        &estimate,
                        horizon,
                        options.cancellation.as_ref(),
                        &mut |percent| {
                            emitter.progress(ExtractionPhase::CalibratingThreshold, percent)
                        },
                    )
                    .await?;
                (calibration.threshold, Some(calibration))
            }
        };
        self.log
            .info(format_args!("slide threshold {threshold:.2}"));
        self.emitter.emit(ExtractionEvent::ThresholdCalibrated {
            threshold,
            differences: calibration.as_ref().map_or(0, |c| c.differences),
        });

        self.transition(ExtractionPhase::Sampling);
        let (slides, counters) = self
            .sample(source, options, settings, horizon, threshold)
            .await?;

        Ok(ExtractionReport {
            slides,
            estimate,
            calibration,
            threshold,
            counters,
        })
    }

    async fn sample<S: MediaSource>(
        &mut self,
        source: &mut S,
        options: &ExtractOptions,
        settings: &ExtractSettings,
        horizon: Horizon,
        threshold: f64,
    ) -> Result<(SlideSet, SampleCounters), Video2PptError> {
        let interval = settings.capture_interval;
        let limit = horizon.limit();
        let mut sampler = FrameSampler::new(settings.seek_policy(), settings.skip_guard())
            .with_horizon(limit)
            .with_log(self.log.clone());
        if let Some(seed) = options.seed {
            sampler = sampler.with_seed(seed);
        }

        let mut slides = SlideSet::with_capacity(settings.max_slides.min(64));
        let mut baseline: Option<Frame> = None;
        let mut step: u64 = 0;

        loop {
            let cursor = step as f64 * interval;
            if cursor > limit {
                break;
            }
            Self::check_cancelled(options)?;

            let mut at_end = false;
            match sampler.sample(source, cursor).await {
                SampleOutcome::Captured { frame, landed } => {
                    at_end = horizon.landed_at_end(cursor, landed);
                    match judge_frame(baseline.as_ref(), &frame, threshold)? {
                        SlideVerdict::Accept { score } => {
                            let index = slides.len();
                            if let Some(slide) = self.accept(&frame, index, score, settings)? {
                                slides.push(slide);
                                baseline = Some(frame);
                            }
                        }
                        SlideVerdict::Reject { score } => {
                            self.log.trace(format_args!(
                                "{cursor:.2}s rejected (score {score:.2} < {threshold:.2})"
                            ));
                        }
                        SlideVerdict::Stale => {
                            self.log.trace(format_args!(
                                "{cursor:.2}s settled at {landed:.2}s, not after the last slide"
                            ));
                        }
                    }
                }
                SampleOutcome::Skipped { .. } => {
                    at_end = horizon.skips_at_end(&sampler.counters(), cursor);
                }
            }

            step += 1;
            let next = step as f64 * interval;
            self.emitter
                .progress(ExtractionPhase::Sampling, (next / limit * 100.0).min(100.0));

            if slides.len() >= settings.max_slides {
                self.log
                    .info(format_args!("reached the {} slide cap", settings.max_slides));
                break;
            }
            if at_end {
                self.log
                    .trace(format_args!("end of media near {cursor:.2}s"));
                break;
            }
            sampler.check_skips()?;
        }

        let counters = sampler.counters();
        if slides.is_empty() {
            return Err(if counters.skipped > 0 {
                Video2PptError::SkipRatioExceeded {
                    skipped: counters.skipped,
                    attempted: counters.attempted,
                }
            } else {
                Video2PptError::NoFramesCaptured
            });
        }

        self.emitter.progress(ExtractionPhase::Sampling, 100.0);
        Ok((slides, counters))
    }

    /// Encode an accepted frame. Per-sample encoding failures drop the frame.
    fn accept(
        &mut self,
        frame: &Frame,
        index: usize,
        score: Option<f64>,
        settings: &ExtractSettings,
    ) -> Result<Option<Slide>, Video2PptError> {
        match encode_jpeg(frame, settings.jpeg_quality) {
            Ok(jpeg) => {
                let slide = Slide::new(
                    index,
                    frame.timestamp(),
                    score,
                    frame.width(),
                    frame.height(),
                    jpeg,
                );
                self.log.trace(format_args!(
                    "slide {} at {:.2}s (score {:?})",
                    index + 1,
                    frame.timestamp().as_secs_f64(),
                    score
                ));
                self.emitter
                    .emit(ExtractionEvent::SlideAccepted(slide.clone()));
                Ok(Some(slide))
            }
            Err(error) if error.is_per_sample() => {
                self.log.warn(format_args!(
                    "dropping frame at {:.2}s: {error}",
                    frame.timestamp().as_secs_f64()
                ));
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }
}
