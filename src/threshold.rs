//! Threshold calibration.
//!
//! Before extraction, a sparse pass over the video measures how much
//! consecutive samples typically differ. Slide-heavy recordings barely change
//! between slides' worth of frames; talking-head or screen-share video
//! changes constantly. The resulting threshold is the smaller of the median
//! and the 20%-trimmed mean of those differences, clamped to a band.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::DurationEstimate;
use crate::error::Video2PptError;
use crate::format::ContainerFormat;
use crate::frame::Frame;
use crate::logging::SessionLog;
use crate::plan::{Horizon, SamplingPlan, SamplingStrategy};
use crate::progress::CancellationToken;
use crate::sampler::{FrameSampler, SampleOutcome, SeekPolicy, SkipGuard};
use crate::source::MediaSource;

/// Threshold when no difference could be measured.
pub const NO_SAMPLES_THRESHOLD: f64 = 30.0;
/// Threshold when too few differences were measured to trust statistics.
pub const FEW_SAMPLES_THRESHOLD: f64 = 25.0;
/// Fewest differences needed for a statistical threshold.
pub const MIN_DIFFERENCES: usize = 3;

const TRIM_LOWER: f64 = 0.2;
const TRIM_UPPER: f64 = 0.8;

/// Inclusive bounds for a calibrated threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBand {
    pub min: f64,
    pub max: f64,
}

impl ThresholdBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for ThresholdBand {
    fn default() -> Self {
        Self::new(10.0, 60.0)
    }
}

/// Derive a threshold from the differences measured during calibration.
///
/// ```
/// use video2ppt::{ThresholdBand, threshold_from_differences};
///
/// let band = ThresholdBand::default();
/// assert_eq!(threshold_from_differences(&[], band), 30.0);
/// assert_eq!(threshold_from_differences(&[5.0, 90.0], band), 25.0);
/// assert_eq!(threshold_from_differences(&[20.0, 22.0, 24.0, 26.0, 80.0], band), 24.0);
/// ```
pub fn threshold_from_differences(differences: &[f64], band: ThresholdBand) -> f64 {
    let mut sorted: Vec<f64> = differences
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .collect();

    if sorted.is_empty() {
        return NO_SAMPLES_THRESHOLD;
    }
    if sorted.len() < MIN_DIFFERENCES {
        return FEW_SAMPLES_THRESHOLD;
    }

    sorted.sort_by(f64::total_cmp);
    let count = sorted.len();
    let median = sorted[count / 2];
    let mean = sorted.iter().sum::<f64>() / count as f64;

    let start = (count as f64 * TRIM_LOWER).floor() as usize;
    let end = ((count as f64 * TRIM_UPPER).ceil() as usize).min(count);
    let trimmed = &sorted[start.min(end)..end];
    let trimmed_mean = if trimmed.is_empty() {
        mean
    } else {
        trimmed.iter().sum::<f64>() / trimmed.len() as f64
    };

    band.clamp(median.min(trimmed_mean))
}

/// Outcome of a calibration pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calibration {
    pub threshold: f64,
    /// Differences that fed the statistics.
    pub differences: usize,
    pub planned_samples: u32,
    pub skipped_samples: u64,
    pub strategy: SamplingStrategy,
    /// The pass stopped early because too many samples were skipped.
    pub aborted: bool,
}

/// Runs the calibration pass.
#[derive(Debug, Clone)]
pub struct ThresholdCalibrator {
    policy: SeekPolicy,
    skip_fraction: f64,
    webm_skip_fraction: f64,
    band: ThresholdBand,
    low_confidence_webm_band: ThresholdBand,
    seed: Option<u64>,
    log: SessionLog,
}

impl Default for ThresholdCalibrator {
    fn default() -> Self {
        Self {
            policy: SeekPolicy::single(Duration::from_secs(3)),
            skip_fraction: 0.4,
            webm_skip_fraction: 0.6,
            band: ThresholdBand::default(),
            low_confidence_webm_band: ThresholdBand::new(8.0, 50.0),
            seed: None,
            log: SessionLog::quiet(),
        }
    }
}

impl ThresholdCalibrator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(mut self, policy: SeekPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fraction of planned samples that may be skipped before the pass stops
    /// early, for WebM and for everything else.
    #[must_use]
    pub fn with_skip_fractions(mut self, default: f64, webm: f64) -> Self {
        self.skip_fraction = default;
        self.webm_skip_fraction = webm;
        self
    }

    /// Clamp bands: the normal one, and the looser one for WebM sources with
    /// a duration confidence below 0.8.
    #[must_use]
    pub fn with_bands(mut self, band: ThresholdBand, low_confidence_webm: ThresholdBand) -> Self {
        self.band = band;
        self.low_confidence_webm_band = low_confidence_webm;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: SessionLog) -> Self {
        self.log = log;
        self
    }

    /// Band that applies to a source of `format` with `estimate`.
    pub fn band_for(&self, format: ContainerFormat, estimate: &DurationEstimate) -> ThresholdBand {
        if format.is_webm() && estimate.confidence < 0.8 {
            self.low_confidence_webm_band
        } else {
            self.band
        }
    }

    /// Sample the video sparsely and derive a threshold.
    ///
    /// `on_progress` receives the pass's completion percentage after every
    /// sample and a final `100.0`.
    ///
    /// # Errors
    ///
    /// Returns [`Video2PptError::Cancelled`] if `cancellation` fires, or
    /// [`Video2PptError::FrameSizeMismatch`] if the source changes frame size
    /// mid-stream. Skipped samples are not errors.
    pub async fn calibrate<S: MediaSource>(
        &self,
        source: &mut S,
        estimate: &DurationEstimate,
        horizon: Horizon,
        cancellation: Option<&CancellationToken>,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<Calibration, Video2PptError> {
        let format = source.format();
        let plan = SamplingPlan::recommend(format, estimate);
        let schedule = plan.calibration_schedule(estimate.seconds);
        let fraction = if format.is_webm() {
            self.webm_skip_fraction
        } else {
            self.skip_fraction
        };

        let mut sampler = FrameSampler::new(
            self.policy,
            SkipGuard::Budget {
                planned: u64::from(schedule.samples),
                fraction,
            },
        )
        .with_horizon(horizon.limit())
        .with_log(self.log.clone());
        if let Some(seed) = self.seed {
            sampler = sampler.with_seed(seed);
        }

        self.log.trace(format_args!(
            "calibrating with {:?}: {} samples every {:.2}s",
            plan.strategy, schedule.samples, schedule.step
        ));

        let mut previous: Option<Frame> = None;
        let mut differences = Vec::with_capacity(schedule.samples as usize);
        let mut aborted = false;

        if schedule.step.is_finite() && schedule.step > 0.0 {
            for index in 0..schedule.samples {
                if cancellation.is_some_and(CancellationToken::is_cancelled) {
                    return Err(Video2PptError::Cancelled);
                }

                let target = f64::from(index) * schedule.step;
                if target > horizon.limit() {
                    break;
                }

                let mut at_end = false;
                match sampler.sample(source, target).await {
                    SampleOutcome::Captured { frame, landed } => {
                        if let Some(previous) = &previous {
                            let score = previous.difference(&frame)?;
                            if score.is_finite() {
                                self.log
                                    .trace(format_args!("{target:.2}s differs by {score:.2}"));
                                differences.push(score);
                            }
                        }
                        previous = Some(frame);
                        at_end = horizon.landed_at_end(target, landed);
                    }
                    SampleOutcome::Skipped { .. } => {
                        at_end = horizon.skips_at_end(&sampler.counters(), target);
                    }
                }

                on_progress(f64::from(index + 1) / f64::from(schedule.samples) * 100.0);

                if at_end {
                    self.log
                        .trace(format_args!("calibration reached the end near {target:.2}s"));
                    break;
                }
                if sampler.should_abort() {
                    let counters = sampler.counters();
                    self.log.warn(format_args!(
                        "calibration skipped {} of {} planned samples, stopping early",
                        counters.skipped, schedule.samples
                    ));
                    aborted = true;
                    break;
                }
            }
        }
        on_progress(100.0);

        let band = self.band_for(format, estimate);
        let threshold = threshold_from_differences(&differences, band);
        Ok(Calibration {
            threshold,
            differences: differences.len(),
            planned_samples: schedule.samples,
            skipped_samples: sampler.counters().skipped,
            strategy: plan.strategy,
            aborted,
        })
    }
}
