//! Blocking source tests: decoders that block the calling thread.
//!
//! These run on the real clock. Blocking worker threads do not observe
//! Tokio's paused time, and the deadline has to win against a thread that
//! is genuinely asleep.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use video2ppt::{
    BlockingMedia, BlockingSource, ContainerFormat, Frame, FrameSampler, MediaInfo, MediaSource,
    SampleOutcome, SeekPolicy, SkipGuard, Video2PptError, seek_with_timeout,
};

/// A decoder that sleeps inside `seek` from some position on, and can fail
/// to draw frames past another.
struct Stalling {
    stall_from: f64,
    stall: Duration,
    capture_fails_from: f64,
    seeks: Arc<AtomicU64>,
}

impl Stalling {
    fn new(stall_from: f64, stall: Duration) -> Self {
        Self {
            stall_from,
            stall,
            capture_fails_from: f64::INFINITY,
            seeks: Arc::new(AtomicU64::new(0)),
        }
    }

    fn with_capture_failures_from(mut self, seconds: f64) -> Self {
        self.capture_fails_from = seconds;
        self
    }
}

impl BlockingMedia for Stalling {
    fn info(&self) -> MediaInfo {
        MediaInfo {
            declared_duration: Some(60.0),
            format: ContainerFormat::Mp4,
            width: 8,
            height: 8,
        }
    }

    fn seek(&mut self, target: f64) -> Result<f64, Video2PptError> {
        self.seeks.fetch_add(1, Ordering::SeqCst);
        if target >= self.stall_from {
            std::thread::sleep(self.stall);
        }
        Ok(target.min(60.0))
    }

    fn capture(&mut self, landed: f64) -> Result<Frame, Video2PptError> {
        if landed >= self.capture_fails_from {
            return Err(Video2PptError::CaptureFailed("corrupt picture".to_string()));
        }
        Ok(Frame::filled(8, 8, [40, 40, 40, 255], Duration::from_secs_f64(landed)))
    }
}

// ── Opening ────────────────────────────────────────────────────────

#[tokio::test]
async fn info_comes_from_the_opened_decoder() {
    let source = BlockingSource::spawn(|| Ok(Stalling::new(f64::INFINITY, Duration::ZERO)))
        .await
        .unwrap();

    assert_eq!(source.info().width, 8);
    assert_eq!(source.declared_duration(), Some(60.0));
    assert_eq!(source.format(), ContainerFormat::Mp4);
    assert_eq!(source.position(), 0.0);
}

#[tokio::test]
async fn open_error_is_returned_from_spawn() {
    let result = BlockingSource::spawn(|| {
        Err::<Stalling, _>(Video2PptError::IoError(std::io::Error::other("no such file")))
    })
    .await;

    assert!(matches!(result, Err(Video2PptError::IoError(_))));
}

// ── Seeking ────────────────────────────────────────────────────────

#[tokio::test]
async fn settled_seek_captures_the_landed_frame() {
    let mut source = BlockingSource::spawn(|| Ok(Stalling::new(f64::INFINITY, Duration::ZERO)))
        .await
        .unwrap();

    let landed = source.seek(75.0).await.unwrap();
    assert_eq!(landed, 60.0);
    assert_eq!(source.position(), 60.0);

    let frame = source.capture().unwrap();
    assert_eq!(frame.timestamp(), Duration::from_secs(60));
    assert_eq!(frame.width(), 8);
}

#[tokio::test]
async fn timeout_fires_while_the_decoder_is_blocked() {
    let mut source =
        BlockingSource::spawn(|| Ok(Stalling::new(5.0, Duration::from_millis(1500))))
            .await
            .unwrap();
    let start = Instant::now();

    let result = seek_with_timeout(&mut source, 10.0, Duration::from_millis(300)).await;

    assert!(matches!(result, Err(Video2PptError::SeekTimeout { .. })));
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(source.position(), 0.0);
    assert!(source.capture().is_err());
}

#[tokio::test]
async fn source_recovers_once_the_stall_ends() {
    let mut source =
        BlockingSource::spawn(|| Ok(Stalling::new(5.0, Duration::from_millis(400))))
            .await
            .unwrap();

    let stalled = seek_with_timeout(&mut source, 10.0, Duration::from_millis(100)).await;
    assert!(stalled.is_err());

    let landed = seek_with_timeout(&mut source, 2.0, Duration::from_secs(5)).await.unwrap();
    assert_eq!(landed, 2.0);
    assert_eq!(source.capture().unwrap().timestamp(), Duration::from_secs(2));
}

#[tokio::test]
async fn abandoned_seeks_are_not_decoded() {
    let decoder = Stalling::new(5.0, Duration::from_millis(800));
    let seeks = Arc::clone(&decoder.seeks);
    let mut source = BlockingSource::spawn(move || Ok(decoder)).await.unwrap();

    // The first seek occupies the worker; the second gives up while queued.
    assert!(seek_with_timeout(&mut source, 10.0, Duration::from_millis(200)).await.is_err());
    assert!(seek_with_timeout(&mut source, 20.0, Duration::from_millis(200)).await.is_err());

    let landed = seek_with_timeout(&mut source, 1.0, Duration::from_secs(5)).await.unwrap();
    assert_eq!(landed, 1.0);
    assert_eq!(seeks.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn sampler_skips_a_stalled_sample() {
    let mut source =
        BlockingSource::spawn(|| Ok(Stalling::new(5.0, Duration::from_millis(1500))))
            .await
            .unwrap();
    let mut sampler = FrameSampler::new(
        SeekPolicy::single(Duration::from_millis(300)),
        SkipGuard::Disabled,
    );
    let start = Instant::now();

    let outcome = sampler.sample(&mut source, 30.0).await;

    assert!(matches!(
        outcome,
        SampleOutcome::Skipped { reason: Video2PptError::SeekTimeout { .. } }
    ));
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(sampler.counters().skipped, 1);
}

// ── Capturing ──────────────────────────────────────────────────────

#[tokio::test]
async fn capture_failure_is_reported_after_a_settled_seek() {
    let mut source = BlockingSource::spawn(|| {
        Ok(Stalling::new(f64::INFINITY, Duration::ZERO).with_capture_failures_from(30.0))
    })
    .await
    .unwrap();

    assert_eq!(source.seek(45.0).await.unwrap(), 45.0);
    match source.capture() {
        Err(Video2PptError::CaptureFailed(reason)) => assert!(reason.contains("corrupt picture")),
        other => panic!("expected a capture failure, got {other:?}"),
    }

    source.seek(10.0).await.unwrap();
    assert!(source.capture().is_ok());
}

#[tokio::test]
async fn capture_before_any_seek_fails() {
    let mut source = BlockingSource::spawn(|| Ok(Stalling::new(f64::INFINITY, Duration::ZERO)))
        .await
        .unwrap();

    assert!(matches!(source.capture(), Err(Video2PptError::CaptureFailed(_))));
}

#[tokio::test]
async fn end_session_drops_the_cached_frame() {
    let mut source = BlockingSource::spawn(|| Ok(Stalling::new(f64::INFINITY, Duration::ZERO)))
        .await
        .unwrap();

    source.seek(3.0).await.unwrap();
    source.end_session();

    assert!(source.capture().is_err());
    source.seek(4.0).await.unwrap();
    assert!(source.capture().is_ok());
}
