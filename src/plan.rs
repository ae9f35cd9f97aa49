//! Sampling plans derived from a duration estimate.
//!
//! [`SamplingPlan::recommend`] turns a [`DurationEstimate`] and the
//! container format into a strategy for the calibration pass, plus a
//! suggested capture interval for the extraction pass. [`Horizon`] describes
//! how far along the timeline a pass may walk when the duration is known,
//! and how it detects the end of the media when it is not.

use serde::{Deserialize, Serialize};

use crate::duration::{DurationEstimate, DurationMethod};
use crate::format::ContainerFormat;
use crate::sampler::SampleCounters;

/// Step used when the duration is unknown.
pub const FIXED_INTERVAL_STEP: f64 = 10.0;
/// Sample cap used when the duration is unknown.
pub const FIXED_INTERVAL_SAMPLES: u32 = 50;

/// A seek landing further than this short of its target is taken as the end
/// of the media on an open horizon.
const END_TOLERANCE: f64 = 1.0;

/// On an open horizon bounded by a declared duration, skips only mark the end
/// of the media from this fraction of that duration onwards.
const DECLARED_END_FRACTION: f64 = 0.95;

/// How calibration samples are spread over the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingStrategy {
    /// Duration unknown: fixed step from zero until the end is found.
    FixedInterval,
    /// Duration uncertain (low confidence or WebM): count scaled with length.
    Adaptive,
    /// Duration trusted: banded sample count spread evenly.
    TimeBased,
}

/// Recommended sampling parameters for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingPlan {
    pub strategy: SamplingStrategy,
    /// Suggested extraction capture interval in seconds.
    pub recommended_interval: f64,
    /// Calibration sample cap.
    pub max_samples: u32,
    pub notes: Vec<String>,
}

/// Where calibration samples go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSchedule {
    pub samples: u32,
    pub step: f64,
}

impl SamplingPlan {
    /// Recommend a plan for a video of the given format.
    ///
    /// ```
    /// use video2ppt::{ContainerFormat, DurationEstimate, DurationMethod, SamplingPlan, SamplingStrategy};
    ///
    /// let estimate = DurationEstimate::new(1200.0, DurationMethod::BinarySearch, 0.95);
    /// let plan = SamplingPlan::recommend(ContainerFormat::Mp4, &estimate);
    /// assert_eq!(plan.strategy, SamplingStrategy::TimeBased);
    /// assert_eq!(plan.recommended_interval, 6.0);
    /// ```
    pub fn recommend(format: ContainerFormat, estimate: &DurationEstimate) -> Self {
        let seconds = estimate.seconds;

        if estimate.is_failed() {
            return Self {
                strategy: SamplingStrategy::FixedInterval,
                recommended_interval: FIXED_INTERVAL_STEP,
                max_samples: FIXED_INTERVAL_SAMPLES,
                notes: vec!["duration unknown, sampling at a fixed interval".to_string()],
            };
        }

        if estimate.confidence < 0.7 {
            return Self {
                strategy: SamplingStrategy::Adaptive,
                recommended_interval: (seconds / 50.0).max(5.0),
                max_samples: ((seconds / 15.0).floor() as u32).clamp(15, 80),
                notes: vec!["low duration confidence, sampling conservatively".to_string()],
            };
        }

        if format.is_webm() {
            return Self {
                strategy: SamplingStrategy::Adaptive,
                recommended_interval: (seconds / 80.0).max(4.0),
                max_samples: ((seconds / 12.0).floor() as u32).clamp(20, 100),
                notes: vec!["WebM duration is probed, sampling adaptively".to_string()],
            };
        }

        let mut notes = Vec::new();
        match estimate.method {
            DurationMethod::BinarySearch => {
                notes.push("duration refined by binary search".to_string())
            }
            DurationMethod::Seek => notes.push("duration from seek-probe".to_string()),
            DurationMethod::AggressiveSeek => {
                notes.push("duration from multi-point seek, treat with care".to_string())
            }
            _ => {}
        }

        let (mut interval, mut max_samples): (f64, u32) = if seconds < 600.0 {
            (4.0, 25)
        } else if seconds < 1800.0 {
            (6.0, 50)
        } else if seconds < 3600.0 {
            (10.0, 80)
        } else {
            (15.0, 120)
        };

        if estimate.confidence < 0.8 {
            interval = (interval * 1.2).ceil();
            max_samples = (f64::from(max_samples) * 0.8).floor() as u32;
            notes.push("moderate confidence, widening the interval".to_string());
        }

        Self {
            strategy: SamplingStrategy::TimeBased,
            recommended_interval: interval,
            max_samples,
            notes,
        }
    }

    /// Number and spacing of calibration samples for a video of `seconds`.
    pub fn calibration_schedule(&self, seconds: f64) -> CalibrationSchedule {
        match self.strategy {
            SamplingStrategy::FixedInterval => CalibrationSchedule {
                samples: self.max_samples,
                step: self.recommended_interval,
            },
            SamplingStrategy::Adaptive => {
                let samples = self.max_samples.max(1);
                CalibrationSchedule {
                    samples,
                    step: seconds / f64::from(samples),
                }
            }
            SamplingStrategy::TimeBased => {
                let samples = time_based_sample_count(seconds);
                CalibrationSchedule {
                    samples,
                    step: seconds / f64::from(samples),
                }
            }
        }
    }
}

/// Calibration sample count for a trusted duration.
pub fn time_based_sample_count(seconds: f64) -> u32 {
    if seconds < 600.0 {
        20
    } else if seconds < 1800.0 {
        50
    } else if seconds < 3600.0 {
        100
    } else {
        150
    }
}

/// How far a pass may walk along the timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Horizon {
    /// Walk up to and including this many seconds.
    Known(f64),
    /// Length unknown: walk until the end of the media shows itself, and
    /// never past `limit`.
    Open {
        limit: f64,
        /// Duration declared by the container, when it gave a usable one.
        declared: Option<f64>,
        /// Consecutive skips, after at least one capture, that count as the
        /// end of the media.
        end_skips: u64,
    },
}

impl Horizon {
    /// Horizon for a pass given the estimate and fallback settings.
    pub fn for_estimate(
        estimate: &DurationEstimate,
        declared: Option<f64>,
        fallback_limit: f64,
        end_skips: u64,
    ) -> Self {
        if !estimate.is_failed() {
            return Horizon::Known(estimate.seconds);
        }
        let declared = declared.filter(|seconds| seconds.is_finite() && *seconds > 0.0);
        Horizon::Open {
            limit: declared.unwrap_or(fallback_limit),
            declared,
            end_skips: end_skips.max(1),
        }
    }

    pub fn limit(&self) -> f64 {
        match *self {
            Horizon::Known(seconds) => seconds,
            Horizon::Open { limit, .. } => limit,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Horizon::Open { .. })
    }

    /// Whether a capture that settled at `landed` while aiming for `target`
    /// has run into the end of the media.
    pub fn landed_at_end(&self, target: f64, landed: f64) -> bool {
        self.is_open() && landed + END_TOLERANCE < target
    }

    /// Whether the run of skips ending with a skip at `target` marks the end
    /// of the media.
    ///
    /// With a declared duration, skips well before it are failures, not the
    /// end, and are left to the skip guard.
    pub fn skips_at_end(&self, counters: &SampleCounters, target: f64) -> bool {
        match *self {
            Horizon::Known(_) => false,
            Horizon::Open {
                declared,
                end_skips,
                ..
            } => {
                let near_end =
                    declared.is_none_or(|seconds| target >= seconds * DECLARED_END_FRACTION);
                near_end && counters.captured > 0 && counters.consecutive_skips >= end_skips
            }
        }
    }
}
