//! Threshold derivation and calibration tests.

use video2ppt::{
    CancellationToken, ContainerFormat, DurationEstimate, DurationMethod, Horizon,
    SamplingStrategy, SeekFault, SyntheticSource, ThresholdBand, ThresholdCalibrator,
    Video2PptError, threshold_from_differences,
};

fn trusted(seconds: f64) -> DurationEstimate {
    DurationEstimate::new(seconds, DurationMethod::BinarySearch, 0.95)
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted[sorted.len() / 2]
}

// ── Derivation ─────────────────────────────────────────────────────

#[test]
fn sparse_inputs_use_fixed_thresholds() {
    let band = ThresholdBand::default();
    assert_eq!(threshold_from_differences(&[], band), 30.0);
    assert_eq!(threshold_from_differences(&[3.0], band), 25.0);
    assert_eq!(threshold_from_differences(&[3.0, 200.0], band), 25.0);
}

#[test]
fn distributions_stay_in_band_and_under_the_median() {
    let distributions: [&[f64]; 6] = [
        &[0.0, 0.0, 0.0],
        &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
        &[15.0, 18.0, 21.0, 24.0, 27.0, 30.0, 33.0],
        &[40.0, 41.0, 42.0, 43.0, 44.0, 250.0, 255.0],
        &[2.0, 2.5, 3.0, 180.0, 190.0, 200.0, 210.0, 220.0],
        &[255.0; 12],
    ];

    for band in [ThresholdBand::default(), ThresholdBand::new(8.0, 50.0)] {
        for distribution in distributions {
            let threshold = threshold_from_differences(distribution, band);
            assert!(
                band.contains(threshold),
                "{threshold} outside {band:?} for {distribution:?}"
            );
            assert!(threshold <= band.clamp(median(distribution)));
        }
    }
}

#[test]
fn known_distributions() {
    let band = ThresholdBand::default();
    // Median 24, trimmed [1..4] = 22, 24, 26 with mean 24.
    assert_eq!(
        threshold_from_differences(&[20.0, 22.0, 24.0, 26.0, 80.0], band),
        24.0
    );
    // Median 43, trimmed mean of 41..=250 pulled up by the outlier.
    assert_eq!(
        threshold_from_differences(&[40.0, 41.0, 42.0, 43.0, 44.0, 250.0, 255.0], band),
        43.0
    );
}

#[test]
fn input_order_does_not_matter() {
    let band = ThresholdBand::default();
    let forward = [12.0, 18.0, 25.0, 31.0, 44.0, 47.0];
    let mut reversed = forward;
    reversed.reverse();
    assert_eq!(
        threshold_from_differences(&forward, band),
        threshold_from_differences(&reversed, band)
    );
}

// ── Bands ──────────────────────────────────────────────────────────

#[test]
fn low_confidence_webm_gets_the_loose_band() {
    let calibrator = ThresholdCalibrator::new();
    let shaky = DurationEstimate::new(300.0, DurationMethod::Seek, 0.6);

    assert_eq!(
        calibrator.band_for(ContainerFormat::Webm, &shaky),
        ThresholdBand::new(8.0, 50.0)
    );
    assert_eq!(
        calibrator.band_for(ContainerFormat::Webm, &trusted(300.0)),
        ThresholdBand::new(10.0, 60.0)
    );
    assert_eq!(
        calibrator.band_for(ContainerFormat::Mp4, &shaky),
        ThresholdBand::new(10.0, 60.0)
    );
}

// ── Calibration pass ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn static_video_calibrates_to_the_band_floor() {
    let mut source = SyntheticSource::new(300.0);
    let estimate = trusted(300.0);

    let calibration = ThresholdCalibrator::new()
        .calibrate(&mut source, &estimate, Horizon::Known(300.0), None, &mut |_| {})
        .await
        .unwrap();

    assert_eq!(calibration.strategy, SamplingStrategy::TimeBased);
    assert_eq!(calibration.planned_samples, 20);
    assert_eq!(calibration.differences, 19);
    assert_eq!(calibration.threshold, 10.0);
    assert!(!calibration.aborted);
}

#[tokio::test(start_paused = true)]
async fn busy_video_calibrates_between_noise_and_cuts() {
    // Every calibration sample lands on a new scene of alternating brightness.
    let mut source = SyntheticSource::new(300.0);
    for index in 0..20 {
        let level = if index % 2 == 0 { 90 } else { 120 };
        source = source.with_scene(f64::from(index) * 15.0, [level, level, level, 255]);
    }

    let calibration = ThresholdCalibrator::new()
        .calibrate(&mut source, &trusted(300.0), Horizon::Known(300.0), None, &mut |_| {})
        .await
        .unwrap();

    assert!((calibration.threshold - 30.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn skip_budget_stops_calibration_early() {
    let mut source = SyntheticSource::new(300.0).with_fault(SeekFault::FailFrom(100.0));
    let mut progress = Vec::new();

    let calibration = ThresholdCalibrator::new()
        .calibrate(
            &mut source,
            &trusted(300.0),
            Horizon::Known(300.0),
            None,
            &mut |percent| progress.push(percent),
        )
        .await
        .unwrap();

    // Samples at 0..=90 succeed; the ninth skip exceeds 40% of 20.
    assert!(calibration.aborted);
    assert_eq!(calibration.skipped_samples, 9);
    assert_eq!(calibration.differences, 6);
    assert_eq!(calibration.threshold, 10.0);

    assert_eq!(progress.last(), Some(&100.0));
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test(start_paused = true)]
async fn open_horizon_ends_on_consecutive_skips() {
    let mut source = SyntheticSource::new(95.0).with_fault(SeekFault::RejectPastEnd);
    let estimate = DurationEstimate::failed();
    let horizon = Horizon::for_estimate(&estimate, None, 7200.0, 3);

    let calibration = ThresholdCalibrator::new()
        .calibrate(&mut source, &estimate, horizon, None, &mut |_| {})
        .await
        .unwrap();

    assert_eq!(calibration.strategy, SamplingStrategy::FixedInterval);
    assert_eq!(calibration.planned_samples, 50);
    assert_eq!(calibration.skipped_samples, 3);
    assert_eq!(calibration.differences, 9);
    assert!(!calibration.aborted);
}

#[tokio::test(start_paused = true)]
async fn open_horizon_ends_when_seeks_fall_short() {
    let mut source = SyntheticSource::new(95.0);
    let estimate = DurationEstimate::failed();
    let horizon = Horizon::for_estimate(&estimate, None, 7200.0, 3);

    let calibration = ThresholdCalibrator::new()
        .calibrate(&mut source, &estimate, horizon, None, &mut |_| {})
        .await
        .unwrap();

    // 0, 10, ..., 90 and the clamped sample at 100 -> 95.
    assert_eq!(calibration.differences, 10);
    assert_eq!(calibration.skipped_samples, 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_calibration_fails() {
    let token = CancellationToken::new();
    token.cancel();
    let mut source = SyntheticSource::new(300.0);

    let result = ThresholdCalibrator::new()
        .calibrate(
            &mut source,
            &trusted(300.0),
            Horizon::Known(300.0),
            Some(&token),
            &mut |_| {},
        )
        .await;

    assert!(matches!(result, Err(Video2PptError::Cancelled)));
}
