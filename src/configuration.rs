//! Extraction configuration.
//!
//! [`ExtractSettings`] holds every numeric tunable of a run as plain data that
//! can be loaded from a JSON file. [`ExtractOptions`] is the builder handed to
//! [`SlideExtractor`](crate::SlideExtractor): it wraps the settings and adds
//! the runtime pieces (event observer, cancellation token, RNG seed).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use video2ppt::{CancellationToken, EventCallback, ExtractOptions, ExtractionEvent};
//!
//! struct LogEvents;
//! impl EventCallback for LogEvents {
//!     fn on_event(&self, event: &ExtractionEvent) {
//!         println!("{event:?}");
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = ExtractOptions::new()
//!     .with_capture_interval(5.0)
//!     .with_max_slides(100)
//!     .with_events(Arc::new(LogEvents))
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::ProbeConfig;
use crate::error::Video2PptError;
use crate::progress::{CancellationToken, EventCallback, NoOpEvents};
use crate::sampler::{SeekPolicy, SkipGuard};
use crate::threshold::{ThresholdBand, ThresholdCalibrator};

/// Largest deck the serializer will produce.
pub const MAX_SLIDES: usize = 256;

/// Every tunable of an extraction run.
///
/// Missing fields take their defaults, so a settings file only needs the
/// values it changes:
///
/// ```
/// use video2ppt::ExtractSettings;
///
/// let settings: ExtractSettings =
///     serde_json::from_str(r#"{ "capture_interval": 5.0, "threshold": 18.5 }"#)?;
/// assert_eq!(settings.capture_interval, 5.0);
/// assert_eq!(settings.max_slides, 256);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSettings {
    /// Seconds between samples during extraction.
    pub capture_interval: f64,
    /// Stop once this many slides were accepted.
    pub max_slides: usize,
    /// Skip calibration and use this threshold.
    pub threshold: Option<f64>,
    /// Deadline for each extraction seek attempt, in seconds.
    pub seek_timeout: f64,
    /// Attempts per extraction sample.
    pub seek_attempts: u32,
    /// Width of the retry jitter, in seconds.
    pub seek_jitter: f64,
    /// Pause before a retry, in milliseconds.
    pub retry_delay_ms: u64,
    /// Fraction of attempted samples that may be skipped during extraction.
    pub skip_ratio: f64,
    /// Attempts before the extraction skip ratio is enforced.
    pub skip_min_attempts: u64,
    /// Deadline for each calibration seek, in seconds.
    pub calibration_seek_timeout: f64,
    /// Fraction of planned calibration samples that may be skipped.
    pub calibration_skip_fraction: f64,
    /// Same, for WebM sources.
    pub calibration_webm_skip_fraction: f64,
    pub threshold_band: ThresholdBand,
    /// Band for WebM sources whose duration confidence is below 0.8.
    pub webm_threshold_band: ThresholdBand,
    /// Furthest an open-horizon pass walks when the duration is unknown.
    pub fallback_horizon: f64,
    /// Consecutive skips that end an open-horizon pass.
    pub fallback_end_skips: u64,
    /// JPEG quality of slide images.
    pub jpeg_quality: u8,
    /// Emit a trace line for every seek, retry and score.
    pub debug_logging: bool,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            capture_interval: 3.0,
            max_slides: MAX_SLIDES,
            threshold: None,
            seek_timeout: 3.0,
            seek_attempts: 3,
            seek_jitter: 0.1,
            retry_delay_ms: 100,
            skip_ratio: 0.5,
            skip_min_attempts: 10,
            calibration_seek_timeout: 3.0,
            calibration_skip_fraction: 0.4,
            calibration_webm_skip_fraction: 0.6,
            threshold_band: ThresholdBand::new(10.0, 60.0),
            webm_threshold_band: ThresholdBand::new(8.0, 50.0),
            fallback_horizon: 7200.0,
            fallback_end_skips: 3,
            jpeg_quality: crate::encode::DEFAULT_JPEG_QUALITY,
            debug_logging: false,
        }
    }
}

impl ExtractSettings {
    /// Load settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, a JSON error if it is
    /// malformed, or [`Video2PptError::InvalidOption`] if a value is out of
    /// range.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, Video2PptError> {
        let text = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Video2PptError::InvalidInterval`] for a non-positive capture
    /// interval and [`Video2PptError::InvalidOption`] for anything else out of
    /// range.
    pub fn validate(&self) -> Result<(), Video2PptError> {
        if !(self.capture_interval.is_finite() && self.capture_interval > 0.0) {
            return Err(Video2PptError::InvalidInterval);
        }
        if self.max_slides == 0 || self.max_slides > MAX_SLIDES {
            return Err(invalid(format!(
                "max_slides must be between 1 and {MAX_SLIDES}, got {}",
                self.max_slides
            )));
        }
        if let Some(threshold) = self.threshold {
            if !(threshold.is_finite() && threshold >= 0.0) {
                return Err(invalid(format!("threshold must be non-negative, got {threshold}")));
            }
        }
        for (name, seconds) in [
            ("seek_timeout", self.seek_timeout),
            ("calibration_seek_timeout", self.calibration_seek_timeout),
        ] {
            if !(seconds.is_finite() && seconds > 0.0) {
                return Err(invalid(format!("{name} must be positive, got {seconds}")));
            }
        }
        if self.seek_attempts == 0 {
            return Err(invalid("seek_attempts must be at least 1".to_string()));
        }
        if !(self.seek_jitter.is_finite() && self.seek_jitter >= 0.0) {
            return Err(invalid(format!("seek_jitter must be non-negative, got {}", self.seek_jitter)));
        }
        for (name, fraction) in [
            ("skip_ratio", self.skip_ratio),
            ("calibration_skip_fraction", self.calibration_skip_fraction),
            ("calibration_webm_skip_fraction", self.calibration_webm_skip_fraction),
        ] {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(invalid(format!("{name} must be within [0, 1], got {fraction}")));
            }
        }
        for (name, band) in [
            ("threshold_band", self.threshold_band),
            ("webm_threshold_band", self.webm_threshold_band),
        ] {
            if !(band.min.is_finite() && band.max.is_finite() && band.min <= band.max) {
                return Err(invalid(format!(
                    "{name} must satisfy min <= max, got [{}, {}]",
                    band.min, band.max
                )));
            }
        }
        if !(self.fallback_horizon.is_finite() && self.fallback_horizon > 0.0) {
            return Err(invalid(format!(
                "fallback_horizon must be positive, got {}",
                self.fallback_horizon
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(invalid(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }

    /// Seek policy for extraction samples.
    pub fn seek_policy(&self) -> SeekPolicy {
        SeekPolicy {
            timeout: Duration::from_secs_f64(self.seek_timeout),
            max_attempts: self.seek_attempts,
            jitter: self.seek_jitter,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// Skip guard for extraction.
    pub fn skip_guard(&self) -> SkipGuard {
        SkipGuard::Ratio {
            ratio: self.skip_ratio,
            min_attempts: self.skip_min_attempts,
        }
    }

    /// Calibrator configured from these settings.
    pub fn calibrator(&self) -> ThresholdCalibrator {
        ThresholdCalibrator::new()
            .with_policy(SeekPolicy::single(Duration::from_secs_f64(
                self.calibration_seek_timeout,
            )))
            .with_skip_fractions(
                self.calibration_skip_fraction,
                self.calibration_webm_skip_fraction,
            )
            .with_bands(self.threshold_band, self.webm_threshold_band)
    }
}

fn invalid(message: String) -> Video2PptError {
    Video2PptError::InvalidOption(message)
}

/// Configuration for a [`SlideExtractor`](crate::SlideExtractor) run.
///
/// All fields have sensible defaults; `ExtractOptions::new()` runs with a 3 s
/// capture interval, a 256-slide cap, a calibrated threshold and no observer.
#[derive(Clone)]
pub struct ExtractOptions {
    pub(crate) settings: ExtractSettings,
    pub(crate) probe: ProbeConfig,
    pub(crate) events: Arc<dyn EventCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) seed: Option<u64>,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("settings", &self.settings)
            .field("has_events", &true)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("seed", &self.seed)
            .finish()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::from_settings(ExtractSettings::default())
    }

    /// Create options from loaded settings.
    pub fn from_settings(settings: ExtractSettings) -> Self {
        Self {
            settings,
            probe: ProbeConfig::default(),
            events: Arc::new(NoOpEvents),
            cancellation: None,
            seed: None,
        }
    }

    /// Seconds between extraction samples.
    #[must_use]
    pub fn with_capture_interval(mut self, seconds: f64) -> Self {
        self.settings.capture_interval = seconds;
        self
    }

    /// Cap on accepted slides. Values above 256 are rejected at run time.
    #[must_use]
    pub fn with_max_slides(mut self, max_slides: usize) -> Self {
        self.settings.max_slides = max_slides;
        self
    }

    /// Use a fixed threshold instead of calibrating.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.settings.threshold = Some(threshold);
        self
    }

    /// Trace every seek, retry and score at `debug` level.
    #[must_use]
    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.settings.debug_logging = enabled;
        self
    }

    /// Override the extraction seek policy.
    #[must_use]
    pub fn with_seek_policy(mut self, policy: SeekPolicy) -> Self {
        self.settings.seek_timeout = policy.timeout.as_secs_f64();
        self.settings.seek_attempts = policy.max_attempts;
        self.settings.seek_jitter = policy.jitter;
        self.settings.retry_delay_ms = policy.retry_delay.as_millis() as u64;
        self
    }

    /// Override the duration probe configuration.
    #[must_use]
    pub fn with_probe_config(mut self, probe: ProbeConfig) -> Self {
        self.probe = probe;
        self
    }

    /// Attach an event observer.
    #[must_use]
    pub fn with_events(mut self, callback: Arc<dyn EventCallback>) -> Self {
        self.events = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled the run stops before its next sample and
    /// fails with [`Video2PptError::Cancelled`].
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Seed the retry jitter, making runs reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn settings(&self) -> &ExtractSettings {
        &self.settings
    }

    pub fn probe_config(&self) -> &ProbeConfig {
        &self.probe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ExtractSettings::default().validate().is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let settings = ExtractSettings {
            capture_interval: 0.0,
            ..ExtractSettings::default()
        };
        assert!(matches!(settings.validate(), Err(Video2PptError::InvalidInterval)));
    }

    #[test]
    fn oversized_cap_is_rejected() {
        let settings = ExtractSettings {
            max_slides: 300,
            ..ExtractSettings::default()
        };
        assert!(matches!(settings.validate(), Err(Video2PptError::InvalidOption(_))));
    }

    #[test]
    fn inverted_band_is_rejected() {
        let settings = ExtractSettings {
            threshold_band: ThresholdBand::new(40.0, 20.0),
            ..ExtractSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn seek_policy_round_trips_through_options() {
        let policy = SeekPolicy {
            timeout: Duration::from_millis(1500),
            max_attempts: 5,
            jitter: 0.2,
            retry_delay: Duration::from_millis(50),
        };
        let options = ExtractOptions::new().with_seek_policy(policy);
        assert_eq!(options.settings().seek_policy(), policy);
    }
}
