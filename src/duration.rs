//! Duration estimation by probing.
//!
//! Container metadata is not trusted: WebM recordings from browsers often
//! carry no duration at all, and some files misreport it. Instead the
//! [`DurationEstimator`] learns the length of a video by asking the source
//! where it can actually seek to:
//!
//! 1. **Seek-probe**: seek far past any plausible end; a player clamps to
//!    the real end.
//! 2. **Binary search**: refine the seek-probe answer by searching for the
//!    largest position the source settles on precisely.
//! 3. **Buffered range**: the end of the last buffered range, if any.
//! 4. **Aggressive multi-point seek**: only when nothing else worked, walk
//!    down a ladder of large targets until a seek lands short.
//!
//! The candidates are then reconciled by [`select_estimate`]. Every probe
//! puts the playback position back where it found it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::SessionLog;
use crate::source::{MediaSource, restore_position, seek_with_timeout};

/// Which probe produced an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DurationMethod {
    Seek,
    BinarySearch,
    Buffered,
    AggressiveSeek,
    /// No probe produced a positive duration.
    Failed,
}

impl DurationMethod {
    /// Position in probe order, used to break confidence ties.
    fn rank(self) -> u8 {
        match self {
            DurationMethod::Seek => 0,
            DurationMethod::BinarySearch => 1,
            DurationMethod::Buffered => 2,
            DurationMethod::AggressiveSeek => 3,
            DurationMethod::Failed => 4,
        }
    }
}

/// Outcome of duration estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationEstimate {
    /// Estimated length in seconds. `0.0` when estimation failed.
    pub seconds: f64,
    pub method: DurationMethod,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Always `true` today: every method is a probe, not a declared value.
    pub is_estimated: bool,
    /// Human-readable notes about probes that failed or disagreed.
    pub warnings: Vec<String>,
}

impl DurationEstimate {
    /// A single probe's answer.
    pub fn new(seconds: f64, method: DurationMethod, confidence: f64) -> Self {
        Self {
            seconds,
            method,
            confidence,
            is_estimated: true,
            warnings: Vec::new(),
        }
    }

    /// The estimate reported when every probe failed.
    pub fn failed() -> Self {
        Self {
            seconds: 0.0,
            method: DurationMethod::Failed,
            confidence: 0.0,
            is_estimated: true,
            warnings: vec!["all duration probes failed".to_string()],
        }
    }

    pub fn is_failed(&self) -> bool {
        self.method == DurationMethod::Failed || self.seconds <= 0.0
    }

    /// The estimate as a [`Duration`], or `None` if estimation failed.
    pub fn duration(&self) -> Option<Duration> {
        (!self.is_failed()).then(|| Duration::from_secs_f64(self.seconds))
    }
}

/// Tunables for every probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    /// Target of the seek-probe. Far beyond any real video.
    pub seek_probe_target: f64,
    pub seek_probe_timeout: Duration,
    /// Deadline for seeking back to the original position.
    pub restore_timeout: Duration,
    /// How far past the seek-probe answer the binary search looks.
    pub binary_search_margin: f64,
    pub binary_search_timeout: Duration,
    pub binary_search_max_iterations: u32,
    /// Search stops once the bracket is narrower than this.
    pub binary_search_resolution: f64,
    /// A probe counts as reachable if it settles within this many seconds.
    pub binary_search_tolerance: f64,
    /// Ladder of targets for the aggressive probe, largest first.
    pub aggressive_targets: Vec<f64>,
    pub aggressive_timeout: Duration,
    /// A ladder seek that lands further than this from its target has found
    /// the end of the media.
    pub aggressive_tolerance: f64,
    /// Relative deviation from the weighted mean beyond which a candidate is
    /// an outlier.
    pub outlier_deviation: f64,
    /// Confidence multiplier applied when every candidate is an outlier.
    pub disagreement_penalty: f64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            seek_probe_target: 999_999.0,
            seek_probe_timeout: Duration::from_secs(3),
            restore_timeout: Duration::from_secs(2),
            binary_search_margin: 60.0,
            binary_search_timeout: Duration::from_millis(1500),
            binary_search_max_iterations: 20,
            binary_search_resolution: 0.5,
            binary_search_tolerance: 1.0,
            aggressive_targets: vec![
                999_999.0, 86_400.0, 36_000.0, 18_000.0, 7_200.0, 3_600.0, 1_800.0, 600.0,
            ],
            aggressive_timeout: Duration::from_secs(2),
            aggressive_tolerance: 10.0,
            outlier_deviation: 0.15,
            disagreement_penalty: 0.7,
        }
    }
}

const SEEK_CONFIDENCE: f64 = 0.9;
const WEBM_SEEK_CONFIDENCE: f64 = 0.8;
const BINARY_SEARCH_CONFIDENCE: f64 = 0.95;
const BUFFERED_CONFIDENCE: f64 = 0.6;
const AGGRESSIVE_CONFIDENCE: f64 = 0.7;

/// Estimates how long a video is by probing its source.
#[derive(Debug, Clone, Default)]
pub struct DurationEstimator {
    config: ProbeConfig,
    log: SessionLog,
}

impl DurationEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: ProbeConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: SessionLog) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Run every applicable probe and reconcile the answers.
    ///
    /// Never fails; an undetectable duration is reported as
    /// [`DurationEstimate::failed`]. The source's playback position is the
    /// same on return as on entry, as far as the source allows.
    pub async fn estimate<S: MediaSource>(&self, source: &mut S) -> DurationEstimate {
        let format = source.format();
        let mut candidates = Vec::new();
        let mut warnings = Vec::new();

        match self.seek_probe(source).await {
            Some(seconds) => {
                let confidence = if format.is_webm() {
                    WEBM_SEEK_CONFIDENCE
                } else {
                    SEEK_CONFIDENCE
                };
                candidates.push(DurationEstimate::new(seconds, DurationMethod::Seek, confidence));

                match self.binary_search(source, seconds).await {
                    Some(refined) => candidates.push(DurationEstimate::new(
                        refined,
                        DurationMethod::BinarySearch,
                        BINARY_SEARCH_CONFIDENCE,
                    )),
                    None => warnings.push("binary search found no reachable position".to_string()),
                }
            }
            None => warnings.push("seek-probe failed".to_string()),
        }

        if let Some(end) = self.buffered(source) {
            candidates.push(DurationEstimate::new(
                end,
                DurationMethod::Buffered,
                BUFFERED_CONFIDENCE,
            ));
        }

        if candidates.is_empty() {
            if let Some(seconds) = self.aggressive_seek(source).await {
                candidates.push(DurationEstimate::new(
                    seconds,
                    DurationMethod::AggressiveSeek,
                    AGGRESSIVE_CONFIDENCE,
                ));
            }
        }

        let mut estimate = select_estimate(candidates, &self.config);
        warnings.append(&mut estimate.warnings);
        estimate.warnings = warnings;

        self.log.trace(format_args!(
            "duration estimate {:.2}s via {:?} (confidence {:.2})",
            estimate.seconds, estimate.method, estimate.confidence
        ));
        estimate
    }

    /// Seek far past the end and report where the source settled.
    pub async fn seek_probe<S: MediaSource>(&self, source: &mut S) -> Option<f64> {
        let original = source.position();
        let result = seek_with_timeout(
            source,
            self.config.seek_probe_target,
            self.config.seek_probe_timeout,
        )
        .await;
        restore_position(source, original, self.config.restore_timeout).await;

        match result {
            Ok(landed) if is_positive(landed) => Some(landed),
            Ok(landed) => {
                self.log
                    .trace(format_args!("seek-probe settled at {landed:.2}s"));
                None
            }
            Err(error) => {
                self.log.trace(format_args!("seek-probe failed: {error}"));
                None
            }
        }
    }

    /// Find the largest position in `[0, rough + margin]` the source can
    /// seek to precisely.
    pub async fn binary_search<S: MediaSource>(&self, source: &mut S, rough: f64) -> Option<f64> {
        let original = source.position();
        let mut low = 0.0_f64;
        let mut high = rough + self.config.binary_search_margin;
        let mut last_valid = 0.0_f64;

        for iteration in 0..self.config.binary_search_max_iterations {
            let mid = (low + high) / 2.0;
            let reachable =
                match seek_with_timeout(source, mid, self.config.binary_search_timeout).await {
                    Ok(landed) if (landed - mid).abs() < self.config.binary_search_tolerance => {
                        last_valid = last_valid.max(landed);
                        true
                    }
                    _ => false,
                };

            if reachable {
                low = mid;
            } else {
                high = mid;
            }
            self.log.trace(format_args!(
                "binary search #{iteration}: {mid:.2}s reachable={reachable}"
            ));

            if high - low < self.config.binary_search_resolution {
                break;
            }
        }

        restore_position(source, original, self.config.restore_timeout).await;
        is_positive(last_valid).then_some(last_valid)
    }

    /// End of the last buffered range.
    pub fn buffered<S: MediaSource>(&self, source: &S) -> Option<f64> {
        source.buffered_end().filter(|end| is_positive(*end))
    }

    /// Walk down the target ladder until a seek lands clearly short of its
    /// target; the furthest settled position is the estimate.
    pub async fn aggressive_seek<S: MediaSource>(&self, source: &mut S) -> Option<f64> {
        let original = source.position();
        let mut best = 0.0_f64;

        for &target in &self.config.aggressive_targets {
            match seek_with_timeout(source, target, self.config.aggressive_timeout).await {
                Ok(landed) if is_positive(landed) => {
                    best = best.max(landed);
                    if (landed - target).abs() >= self.config.aggressive_tolerance {
                        self.log
                            .trace(format_args!("ladder found the end near {landed:.2}s"));
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    self.log
                        .trace(format_args!("ladder seek to {target:.0}s failed: {error}"));
                }
            }
        }

        restore_position(source, original, self.config.restore_timeout).await;
        is_positive(best).then_some(best)
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Reconcile probe candidates into one estimate.
///
/// - no candidates: [`DurationEstimate::failed`];
/// - one candidate: that candidate;
/// - a binary-search candidate is always preferred;
/// - otherwise candidates further than the configured relative deviation
///   from the confidence-weighted mean are discarded and the most confident
///   survivor wins, the earlier probe breaking ties;
/// - if nothing survives, the most confident candidate wins with its
///   confidence scaled down and a warning attached.
pub fn select_estimate(candidates: Vec<DurationEstimate>, config: &ProbeConfig) -> DurationEstimate {
    let candidates: Vec<DurationEstimate> = candidates
        .into_iter()
        .filter(|candidate| is_positive(candidate.seconds))
        .collect();

    match candidates.len() {
        0 => return DurationEstimate::failed(),
        1 => return candidates.into_iter().next().unwrap_or_else(DurationEstimate::failed),
        _ => {}
    }

    if let Some(binary) = candidates
        .iter()
        .find(|candidate| candidate.method == DurationMethod::BinarySearch)
    {
        return binary.clone();
    }

    let total_weight: f64 = candidates.iter().map(|c| c.confidence).sum();
    let weighted_mean = if total_weight > 0.0 {
        candidates.iter().map(|c| c.seconds * c.confidence).sum::<f64>() / total_weight
    } else {
        candidates.iter().map(|c| c.seconds).sum::<f64>() / candidates.len() as f64
    };

    let survivors: Vec<&DurationEstimate> = candidates
        .iter()
        .filter(|c| (c.seconds - weighted_mean).abs() / weighted_mean < config.outlier_deviation)
        .collect();

    if let Some(best) = most_confident(survivors.iter().copied()) {
        return best.clone();
    }

    let mut best = most_confident(candidates.iter())
        .cloned()
        .unwrap_or_else(DurationEstimate::failed);
    best.confidence *= config.disagreement_penalty;
    best.warnings
        .push("duration probes disagree; confidence reduced".to_string());
    best
}

fn most_confident<'a>(
    candidates: impl Iterator<Item = &'a DurationEstimate>,
) -> Option<&'a DurationEstimate> {
    candidates.reduce(|best, current| {
        let more_confident = current.confidence > best.confidence
            || (current.confidence == best.confidence
                && current.method.rank() < best.method.rank());
        if more_confident { current } else { best }
    })
}
