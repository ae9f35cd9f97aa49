//! Seek-and-capture with timeouts, jittered retries and skip accounting.
//!
//! A [`FrameSampler`] turns "give me the frame at `t`" into a bounded loop:
//! each attempt seeks under a deadline and, if the seek times out or is
//! rejected, the next attempt waits briefly and aims at a slightly jittered
//! target, since a source that stalls on one exact timestamp often settles
//! a few frames away. When every attempt fails the sample is *skipped*.
//! Nothing in here aborts a session on its own; callers consult
//! [`FrameSampler::check_skips`] after each sample.

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::error::Video2PptError;
use crate::frame::Frame;
use crate::logging::SessionLog;
use crate::source::{MediaSource, seek_with_timeout};

/// Timeout and retry policy for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekPolicy {
    /// Deadline for each seek attempt.
    pub timeout: Duration,
    /// Attempts per sample, including the first. At least 1.
    pub max_attempts: u32,
    /// Width in seconds of the uniform jitter applied to retry targets.
    pub jitter: f64,
    /// Pause before each retry.
    pub retry_delay: Duration,
}

impl SeekPolicy {
    /// One attempt, no retries.
    pub fn single(timeout: Duration) -> Self {
        Self {
            timeout,
            max_attempts: 1,
            jitter: 0.0,
            retry_delay: Duration::ZERO,
        }
    }
}

impl Default for SeekPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            max_attempts: 3,
            jitter: 0.1,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// When accumulated skips should end a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipGuard {
    /// Fire once more than `min_attempts` samples were attempted and more
    /// than `ratio` of them were skipped.
    Ratio { ratio: f64, min_attempts: u64 },
    /// Fire once skips exceed `fraction` of a planned sample count.
    Budget { planned: u64, fraction: f64 },
    /// Never fire.
    Disabled,
}

impl SkipGuard {
    /// Whether the counters have crossed the limit.
    pub fn is_exceeded(&self, counters: &SampleCounters) -> bool {
        match *self {
            SkipGuard::Ratio {
                ratio,
                min_attempts,
            } => {
                counters.attempted > min_attempts
                    && counters.skipped as f64 > counters.attempted as f64 * ratio
            }
            SkipGuard::Budget { planned, fraction } => {
                counters.skipped as f64 > planned as f64 * fraction
            }
            SkipGuard::Disabled => false,
        }
    }
}

impl Default for SkipGuard {
    fn default() -> Self {
        SkipGuard::Ratio {
            ratio: 0.5,
            min_attempts: 10,
        }
    }
}

/// Running totals for one sampler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleCounters {
    pub attempted: u64,
    pub captured: u64,
    pub skipped: u64,
    /// Skips since the last successful capture.
    pub consecutive_skips: u64,
}

/// Result of one sample.
#[derive(Debug)]
pub enum SampleOutcome {
    /// The seek settled and the frame was drawn.
    Captured {
        frame: Frame,
        /// Position the source settled on, which may differ from the target.
        landed: f64,
    },
    /// Every attempt failed.
    Skipped {
        /// Error from the final attempt.
        reason: Video2PptError,
    },
}

impl SampleOutcome {
    pub fn is_captured(&self) -> bool {
        matches!(self, SampleOutcome::Captured { .. })
    }
}

/// Samples frames from a [`MediaSource`] under a [`SeekPolicy`].
#[derive(Debug)]
pub struct FrameSampler {
    policy: SeekPolicy,
    guard: SkipGuard,
    horizon: Option<f64>,
    rng: StdRng,
    counters: SampleCounters,
    log: SessionLog,
}

impl FrameSampler {
    /// Create a sampler with an entropy-seeded jitter source.
    pub fn new(policy: SeekPolicy, guard: SkipGuard) -> Self {
        Self {
            policy,
            guard,
            horizon: None,
            rng: StdRng::from_entropy(),
            counters: SampleCounters::default(),
            log: SessionLog::quiet(),
        }
    }

    /// Make retry jitter reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Clamp jittered retry targets to `[0, horizon]`.
    #[must_use]
    pub fn with_horizon(mut self, horizon: f64) -> Self {
        self.horizon = Some(horizon);
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: SessionLog) -> Self {
        self.log = log;
        self
    }

    pub fn counters(&self) -> SampleCounters {
        self.counters
    }

    pub fn policy(&self) -> &SeekPolicy {
        &self.policy
    }

    /// Seek to `target` seconds and capture the frame there.
    ///
    /// Never fails: exhausted attempts and capture failures are reported as
    /// [`SampleOutcome::Skipped`] and counted. Only seek errors that
    /// [`affect a single sample`](Video2PptError::is_per_sample) are retried.
    pub async fn sample<S: MediaSource>(&mut self, source: &mut S, target: f64) -> SampleOutcome {
        self.counters.attempted += 1;

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        let mut last_error = Video2PptError::SeekFailed {
            target,
            reason: "no seek attempted".to_string(),
        };

        while attempt < max_attempts {
            let aimed = if attempt == 0 {
                target
            } else {
                tokio::time::sleep(self.policy.retry_delay).await;
                self.jittered(target)
            };
            attempt += 1;

            match seek_with_timeout(source, aimed, self.policy.timeout).await {
                Ok(landed) => match source.capture() {
                    Ok(frame) => {
                        self.counters.captured += 1;
                        self.counters.consecutive_skips = 0;
                        self.log.trace(format_args!(
                            "captured {target:.2}s (landed {landed:.2}s, attempt {attempt})"
                        ));
                        return SampleOutcome::Captured { frame, landed };
                    }
                    Err(error) => {
                        // The seek settled, so another attempt would draw the same frame.
                        self.log
                            .trace(format_args!("capture at {landed:.2}s failed: {error}"));
                        last_error = error;
                        break;
                    }
                },
                Err(error) if error.is_per_sample() => {
                    self.log.trace(format_args!(
                        "attempt {attempt}/{max_attempts} for {aimed:.2}s failed: {error}"
                    ));
                    last_error = error;
                }
                Err(error) => {
                    self.log.trace(format_args!(
                        "seek to {aimed:.2}s failed without retry: {error}"
                    ));
                    last_error = error;
                    break;
                }
            }
        }

        self.counters.skipped += 1;
        self.counters.consecutive_skips += 1;
        self.log
            .trace(format_args!("skipped sample at {target:.2}s: {last_error}"));
        SampleOutcome::Skipped { reason: last_error }
    }

    /// Whether the skip guard has fired.
    pub fn should_abort(&self) -> bool {
        self.guard.is_exceeded(&self.counters)
    }

    /// Fail with [`Video2PptError::SkipRatioExceeded`] once the skip guard
    /// has fired.
    pub fn check_skips(&self) -> Result<(), Video2PptError> {
        if self.should_abort() {
            return Err(Video2PptError::SkipRatioExceeded {
                skipped: self.counters.skipped,
                attempted: self.counters.attempted,
            });
        }
        Ok(())
    }

    fn jittered(&mut self, target: f64) -> f64 {
        let offset = (self.rng.r#gen::<f64>() - 0.5) * self.policy.jitter;
        let upper = self.horizon.unwrap_or(f64::INFINITY);
        (target + offset).clamp(0.0, upper.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_guard_needs_minimum_attempts() {
        let guard = SkipGuard::default();
        let counters = SampleCounters {
            attempted: 10,
            skipped: 10,
            ..SampleCounters::default()
        };
        assert!(!guard.is_exceeded(&counters));

        let counters = SampleCounters {
            attempted: 11,
            skipped: 6,
            ..SampleCounters::default()
        };
        assert!(guard.is_exceeded(&counters));
    }

    #[test]
    fn budget_guard_counts_against_plan() {
        let guard = SkipGuard::Budget {
            planned: 20,
            fraction: 0.4,
        };
        let mut counters = SampleCounters {
            attempted: 8,
            skipped: 8,
            ..SampleCounters::default()
        };
        assert!(!guard.is_exceeded(&counters));
        counters.skipped = 9;
        assert!(guard.is_exceeded(&counters));
    }

    #[test]
    fn jitter_stays_within_span_and_horizon() {
        let mut sampler = FrameSampler::new(SeekPolicy::default(), SkipGuard::Disabled)
            .with_seed(7)
            .with_horizon(10.0);

        for _ in 0..200 {
            let target = sampler.jittered(5.0);
            assert!((target - 5.0).abs() <= 0.05);
        }
        for _ in 0..200 {
            let target = sampler.jittered(10.0);
            assert!(target <= 10.0 && target >= 9.95);
        }
        for _ in 0..200 {
            assert!(sampler.jittered(0.0) >= 0.0);
        }
    }

    #[test]
    fn seeded_jitter_is_reproducible() {
        let mut first = FrameSampler::new(SeekPolicy::default(), SkipGuard::Disabled).with_seed(42);
        let mut second =
            FrameSampler::new(SeekPolicy::default(), SkipGuard::Disabled).with_seed(42);
        for _ in 0..10 {
            assert_eq!(first.jittered(30.0), second.jittered(30.0));
        }
    }
}
