//! Difference metric tests.

use std::time::Duration;

use image::{Rgba, RgbaImage};
use video2ppt::{Frame, Video2PptError, luminance, luminance_rms};

fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}

// ── Luminance ──────────────────────────────────────────────────────

#[test]
fn luminance_weights_green_most() {
    let red = luminance(&[255, 0, 0, 255]);
    let green = luminance(&[0, 255, 0, 255]);
    let blue = luminance(&[0, 0, 255, 255]);
    assert!(green > red && red > blue);
    assert!((red + green + blue - 255.0).abs() < 1e-9);
}

#[test]
fn luminance_ignores_alpha() {
    assert_eq!(luminance(&[10, 20, 30, 0]), luminance(&[10, 20, 30, 255]));
}

// ── RMS ────────────────────────────────────────────────────────────

#[test]
fn identical_frames_score_zero() {
    let frame = solid(16, 9, [12, 200, 80, 255]);
    assert_eq!(luminance_rms(&frame, &frame).unwrap(), 0.0);
}

#[test]
fn black_against_white_scores_full_range() {
    let score = luminance_rms(&solid(8, 8, [0, 0, 0, 255]), &solid(8, 8, [255, 255, 255, 255]))
        .unwrap();
    assert!((score - 255.0).abs() < 1e-9);
}

#[test]
fn score_is_symmetric() {
    let left = solid(8, 8, [30, 60, 90, 255]);
    let right = solid(8, 8, [200, 10, 40, 255]);
    assert_eq!(
        luminance_rms(&left, &right).unwrap(),
        luminance_rms(&right, &left).unwrap()
    );
}

#[test]
fn partial_change_scales_with_area() {
    // A quarter of the pixels flip from black to white: rms = 255 * sqrt(1/4).
    let left = solid(4, 4, [0, 0, 0, 255]);
    let mut right = left.clone();
    for x in 0..4 {
        right.put_pixel(x, 0, Rgba([255, 255, 255, 255]));
    }
    let score = luminance_rms(&left, &right).unwrap();
    assert!((score - 127.5).abs() < 1e-9);
}

#[test]
fn empty_frames_score_zero() {
    let empty = RgbaImage::new(0, 0);
    assert_eq!(luminance_rms(&empty, &empty).unwrap(), 0.0);
}

#[test]
fn mismatched_sizes_are_an_error() {
    let result = luminance_rms(&solid(4, 4, [0; 4]), &solid(4, 5, [0; 4]));
    assert!(matches!(
        result,
        Err(Video2PptError::FrameSizeMismatch {
            left_width: 4,
            left_height: 4,
            right_width: 4,
            right_height: 5,
        })
    ));
}

// ── Frame ──────────────────────────────────────────────────────────

#[test]
fn frame_difference_delegates_to_metric() {
    let black = Frame::filled(8, 8, [0, 0, 0, 255], Duration::ZERO);
    let white = Frame::filled(8, 8, [255, 255, 255, 255], Duration::from_secs(3));
    assert!((black.difference(&white).unwrap() - 255.0).abs() < 1e-9);
}

#[test]
fn frame_from_short_buffer_fails() {
    let result = Frame::from_rgba(4, 4, vec![0; 10], Duration::ZERO);
    assert!(matches!(result, Err(Video2PptError::CaptureFailed(_))));
}
