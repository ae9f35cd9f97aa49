//! Extraction events, progress reporting and cancellation.
//!
//! A running [`SlideExtractor`](crate::SlideExtractor) reports everything it
//! does as an [`ExtractionEvent`]: phase changes, per-phase progress, the
//! duration estimate, the calibrated threshold, each accepted slide, and
//! exactly one terminal event ([`ExtractionEvent::Completed`] or
//! [`ExtractionEvent::Failed`]).
//!
//! Observers either implement [`EventCallback`] or subscribe through
//! [`event_channel`], which hands back an [`EventStream`] usable with
//! [`StreamExt`](tokio_stream::StreamExt).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use video2ppt::{EventCallback, ExtractionEvent, ExtractOptions};
//!
//! struct PrintProgress;
//!
//! impl EventCallback for PrintProgress {
//!     fn on_event(&self, event: &ExtractionEvent) {
//!         if let ExtractionEvent::Progress { phase, percent } = event {
//!             println!("[{phase:?}] {percent:.1}%");
//!         }
//!     }
//! }
//!
//! let options = ExtractOptions::new().with_events(Arc::new(PrintProgress));
//! ```

use std::pin::Pin;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::task::{Context, Poll};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_stream::Stream;

use crate::duration::DurationEstimate;
use crate::extractor::ExtractionPhase;
use crate::slides::{Slide, SlideSet};

/// Something that happened during an extraction run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ExtractionEvent {
    /// The state machine entered a new phase.
    PhaseChanged(ExtractionPhase),
    /// Completion percentage (0–100) of the current phase. Calibration and
    /// sampling each run from 0 to 100 on their own.
    Progress { phase: ExtractionPhase, percent: f64 },
    /// Duration estimation finished, successfully or not.
    DurationDetected(DurationEstimate),
    /// The threshold that sampling will use.
    ThresholdCalibrated {
        threshold: f64,
        /// Differences measured; zero when the threshold was fixed.
        differences: usize,
    },
    /// A slide was accepted and encoded.
    SlideAccepted(Slide),
    /// Terminal: the run produced a slide set.
    Completed(SlideSet),
    /// Terminal: the run failed and produced nothing.
    Failed(String),
}

impl ExtractionEvent {
    /// Whether this is one of the two terminal events.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExtractionEvent::Completed(_) | ExtractionEvent::Failed(_)
        )
    }
}

/// Receives extraction events.
///
/// Implementations must be [`Send`] and [`Sync`] so a single observer can be
/// shared between runs on different tasks.
///
/// Callbacks are **infallible**: they observe but cannot halt the run. Use
/// [`CancellationToken`] for cooperative cancellation.
pub trait EventCallback: Send + Sync {
    fn on_event(&self, event: &ExtractionEvent);
}

/// Discards all events. The default observer.
pub(crate) struct NoOpEvents;

impl EventCallback for NoOpEvents {
    fn on_event(&self, _event: &ExtractionEvent) {}
}

impl EventCallback for UnboundedSender<ExtractionEvent> {
    fn on_event(&self, event: &ExtractionEvent) {
        // The receiver may have been dropped; events are then discarded.
        let _ = self.send(event.clone());
    }
}

/// A stream of events from a run observed through [`event_channel`].
///
/// Ends once the run's observer (and every clone of it) has been dropped,
/// which happens when the [`ExtractOptions`](crate::ExtractOptions) holding
/// it goes away.
pub struct EventStream {
    receiver: UnboundedReceiver<ExtractionEvent>,
}

impl Stream for EventStream {
    type Item = ExtractionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Create an observer that forwards every event into an [`EventStream`].
///
/// # Example
///
/// ```
/// use tokio_stream::StreamExt;
/// use video2ppt::{ExtractOptions, ExtractionEvent, SlideExtractor, SyntheticSource, event_channel};
///
/// # async fn example() -> Result<(), video2ppt::Video2PptError> {
/// let (observer, mut events) = event_channel();
/// let extractor = SlideExtractor::new(ExtractOptions::new().with_events(observer));
///
/// let mut source = SyntheticSource::new(30.0);
/// extractor.extract(&mut source).await?;
/// drop(extractor);
///
/// while let Some(event) = events.next().await {
///     if let ExtractionEvent::SlideAccepted(slide) = event {
///         println!("slide {} at {:?}", slide.index(), slide.timestamp());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn event_channel() -> (Arc<dyn EventCallback>, EventStream) {
    let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
    (Arc::new(sender), EventStream { receiver })
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between tasks; call
/// [`cancel`](CancellationToken::cancel) from anywhere to stop the associated
/// run. The extractor checks [`is_cancelled`](CancellationToken::is_cancelled)
/// before every sample. Dropping the extraction future also cancels it, along
/// with any pending seek timers.
///
/// # Example
///
/// ```
/// use video2ppt::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Emits events for one run and enforces the single terminal event.
pub(crate) struct EventEmitter {
    callback: Arc<dyn EventCallback>,
    terminated: bool,
    last_percent: Option<(ExtractionPhase, f64)>,
}

impl EventEmitter {
    pub(crate) fn new(callback: Arc<dyn EventCallback>) -> Self {
        Self {
            callback,
            terminated: false,
            last_percent: None,
        }
    }

    pub(crate) fn emit(&mut self, event: ExtractionEvent) {
        if self.terminated {
            return;
        }
        self.terminated = event.is_terminal();
        self.callback.on_event(&event);
    }

    /// Report progress, clamped to `[0, 100]` and never repeated verbatim.
    pub(crate) fn progress(&mut self, phase: ExtractionPhase, percent: f64) {
        let percent = if percent.is_finite() {
            percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        if self.last_percent == Some((phase, percent)) {
            return;
        }
        self.last_percent = Some((phase, percent));
        self.emit(ExtractionEvent::Progress { phase, percent });
    }
}
