//! End-to-end extraction tests against scripted sources.
//!
//! Every test runs with paused time: seek deadlines, retry pauses and
//! hanging seeks resolve instantly while keeping their ordering.

use std::time::Duration;

use video2ppt::{
    CancellationToken, ExtractOptions, SeekFault, SlideExtractor, SyntheticSource,
    Video2PptError,
};

const BLACK: [u8; 4] = [0, 0, 0, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];

fn fixed_threshold() -> ExtractOptions {
    ExtractOptions::new().with_threshold(20.0).with_seed(1)
}

// ── Happy path ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn scene_change_produces_two_slides() {
    let mut source = SyntheticSource::new(300.0)
        .with_scene(0.0, BLACK)
        .with_scene(60.0, WHITE);

    let slides = SlideExtractor::new(fixed_threshold())
        .extract(&mut source)
        .await
        .unwrap();

    assert_eq!(slides.len(), 2);
    assert_eq!(
        slides.timestamps(),
        vec![Duration::ZERO, Duration::from_secs(60)]
    );
    assert_eq!(slides.get(0).unwrap().score(), None);
    assert!(slides.get(1).unwrap().score().unwrap() >= 20.0);
}

#[tokio::test(start_paused = true)]
async fn slides_are_valid_jpegs_at_source_size() {
    let mut source = SyntheticSource::new(60.0)
        .with_size(64, 36)
        .with_scene(0.0, BLACK)
        .with_scene(30.0, WHITE);

    let slides = SlideExtractor::new(fixed_threshold())
        .extract(&mut source)
        .await
        .unwrap();

    for slide in &slides {
        assert_eq!((slide.width(), slide.height()), (64, 36));
        let decoded = image::load_from_memory(slide.jpeg()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 36));
    }
}

#[tokio::test(start_paused = true)]
async fn calibrated_run_ignores_noise_and_keeps_cuts() {
    let mut source = SyntheticSource::new(600.0).with_noise(4);
    for minute in 0..10 {
        let color = if minute % 2 == 0 { BLACK } else { WHITE };
        source = source.with_scene(f64::from(minute) * 60.0, color);
    }

    let report = SlideExtractor::new(ExtractOptions::new().with_seed(3))
        .extract_with_report(&mut source)
        .await
        .unwrap();

    let calibration = report.calibration.as_ref().unwrap();
    assert_eq!(calibration.threshold, 10.0);
    assert_eq!(report.threshold, 10.0);
    assert_eq!(report.slides.len(), 10);

    let timestamps = report.slides.timestamps();
    assert!(timestamps.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(timestamps[9], Duration::from_secs(540));
}

#[tokio::test(start_paused = true)]
async fn slide_cap_stops_sampling() {
    let mut source = SyntheticSource::new(300.0);
    for index in 0..30 {
        let color = if index % 2 == 0 { BLACK } else { WHITE };
        source = source.with_scene(f64::from(index) * 10.0, color);
    }

    let report = SlideExtractor::new(fixed_threshold().with_capture_interval(5.0).with_max_slides(3))
        .extract_with_report(&mut source)
        .await
        .unwrap();

    assert_eq!(report.slides.len(), 3);
    assert_eq!(
        report.slides.timestamps(),
        vec![
            Duration::ZERO,
            Duration::from_secs(10),
            Duration::from_secs(20)
        ]
    );
    // Stopped at the slide that hit the cap.
    assert_eq!(report.counters.attempted, 5);
}

#[tokio::test(start_paused = true)]
async fn slide_indices_follow_order() {
    let mut source = SyntheticSource::new(120.0)
        .with_scene(0.0, BLACK)
        .with_scene(40.0, WHITE)
        .with_scene(80.0, BLACK);

    let slides = SlideExtractor::new(fixed_threshold())
        .extract(&mut source)
        .await
        .unwrap();

    let indices: Vec<usize> = slides.iter().map(|slide| slide.index()).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

// ── Faulty sources ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn hanging_source_aborts_on_skip_ratio() {
    let mut source = SyntheticSource::new(300.0).with_fault(SeekFault::HangFrom(0.0));

    let result = SlideExtractor::new(ExtractOptions::new().with_seed(1))
        .extract(&mut source)
        .await;

    assert!(matches!(
        result,
        Err(Video2PptError::SkipRatioExceeded {
            skipped: 11,
            attempted: 11
        })
    ));
    assert_eq!(source.capture_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_duration_walks_until_the_end() {
    let mut source = SyntheticSource::new(300.0)
        .with_scene(0.0, BLACK)
        .with_scene(150.0, WHITE)
        .with_fault(SeekFault::RejectPastEnd);

    let report = SlideExtractor::new(fixed_threshold())
        .extract_with_report(&mut source)
        .await
        .unwrap();

    assert!(report.estimate.is_failed());
    assert_eq!(report.slides.len(), 2);
    // 0, 3, ..., 300 captured, then three rejected samples past the end.
    assert_eq!(report.counters.captured, 101);
    assert_eq!(report.counters.skipped, 3);
}

#[tokio::test(start_paused = true)]
async fn failing_tail_trips_the_skip_ratio() {
    let mut source = SyntheticSource::new(300.0)
        .with_buffered_end(300.0)
        .with_fault(SeekFault::FailFrom(61.0));

    let result = SlideExtractor::new(ExtractOptions::new().with_seed(5))
        .extract(&mut source)
        .await;

    // 21 captures (0..=60), then skips until they outnumber half the attempts.
    assert!(matches!(
        result,
        Err(Video2PptError::SkipRatioExceeded {
            skipped: 22,
            attempted: 43
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn failures_well_before_the_declared_end_trip_the_skip_ratio() {
    // Every probe fails, so the walk is bounded by the declared 300 s.
    let mut source = SyntheticSource::new(300.0)
        .with_declared_duration(300.0)
        .with_scene(0.0, BLACK)
        .with_fault(SeekFault::FailFrom(100.0));

    let result = SlideExtractor::new(fixed_threshold()).extract(&mut source).await;

    // 34 captures (0..=99), then skips at 102 s onwards are failures, not the end.
    assert!(matches!(
        result,
        Err(Video2PptError::SkipRatioExceeded {
            skipped: 35,
            attempted: 69
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn failures_at_the_declared_end_finish_the_walk() {
    let mut source = SyntheticSource::new(300.0)
        .with_declared_duration(300.0)
        .with_scene(0.0, BLACK)
        .with_scene(150.0, WHITE)
        .with_fault(SeekFault::FailFrom(290.0));

    let report = SlideExtractor::new(fixed_threshold())
        .extract_with_report(&mut source)
        .await
        .unwrap();

    assert!(report.estimate.is_failed());
    assert_eq!(report.slides.len(), 2);
    assert_eq!(report.counters.captured, 97);
    assert_eq!(report.counters.skipped, 3);
}

#[tokio::test(start_paused = true)]
async fn capture_failures_everywhere_report_skips() {
    let mut source = SyntheticSource::new(60.0).with_capture_failures_from(0.0);

    let result = SlideExtractor::new(fixed_threshold()).extract(&mut source).await;

    assert!(matches!(
        result,
        Err(Video2PptError::SkipRatioExceeded { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn unencodable_frames_are_dropped() {
    let mut source = SyntheticSource::new(30.0).with_size(0, 0);

    let result = SlideExtractor::new(fixed_threshold()).extract(&mut source).await;

    assert!(matches!(result, Err(Video2PptError::NoFramesCaptured)));
}

// ── Options and lifecycle ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn invalid_interval_is_rejected_before_seeking() {
    let mut source = SyntheticSource::new(60.0);

    let result = SlideExtractor::new(ExtractOptions::new().with_capture_interval(0.0))
        .extract(&mut source)
        .await;

    assert!(matches!(result, Err(Video2PptError::InvalidInterval)));
    assert_eq!(source.seek_count(), 0);
    assert_eq!(source.sessions_ended(), 1);
}

#[tokio::test(start_paused = true)]
async fn oversized_cap_is_rejected() {
    let mut source = SyntheticSource::new(60.0);

    let result = SlideExtractor::new(ExtractOptions::new().with_max_slides(257))
        .extract(&mut source)
        .await;

    assert!(matches!(result, Err(Video2PptError::InvalidOption(_))));
}

#[tokio::test(start_paused = true)]
async fn cancelled_run_fails_and_ends_the_session() {
    let token = CancellationToken::new();
    token.cancel();
    let mut source = SyntheticSource::new(60.0);

    let result = SlideExtractor::new(ExtractOptions::new().with_cancellation(token))
        .extract(&mut source)
        .await;

    assert!(matches!(result, Err(Video2PptError::Cancelled)));
    assert_eq!(source.sessions_ended(), 1);
}

#[tokio::test(start_paused = true)]
async fn session_ends_once_per_run() {
    let mut source = SyntheticSource::new(30.0);
    let extractor = SlideExtractor::new(fixed_threshold());

    extractor.extract(&mut source).await.unwrap();
    extractor.extract(&mut source).await.unwrap();

    assert_eq!(source.sessions_ended(), 2);
}

#[tokio::test(start_paused = true)]
async fn dropped_run_still_ends_the_session() {
    let mut source = SyntheticSource::new(300.0).with_fault(SeekFault::HangFrom(0.0));
    let extractor = SlideExtractor::new(ExtractOptions::new());

    let outcome =
        tokio::time::timeout(Duration::from_secs(1), extractor.extract(&mut source)).await;

    assert!(outcome.is_err());
    assert_eq!(source.sessions_ended(), 1);
}
