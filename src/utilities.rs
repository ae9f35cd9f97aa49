//! FFmpeg frame and timestamp helpers.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Microseconds per second, FFmpeg's container-level time base.
const MICROSECONDS_PER_SECOND: f64 = 1_000_000.0;

/// Copy an RGBA frame into a tightly packed buffer.
///
/// Decoded planes often carry per-row padding (stride > width × 4). The
/// padding is stripped so the result can go straight to
/// [`Frame::from_rgba`](crate::Frame::from_rgba).
pub(crate) fn frame_to_rgba_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_bytes = (width as usize) * 4;
    let data = video_frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_bytes]);
        }
        buffer
    }
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Seconds to a container-level seek timestamp.
pub(crate) fn seconds_to_container_timestamp(seconds: f64) -> i64 {
    (seconds.max(0.0) * MICROSECONDS_PER_SECOND) as i64
}

/// Container-level duration (microseconds) to seconds. `None` if unset.
pub(crate) fn container_duration_seconds(duration: i64) -> Option<f64> {
    (duration > 0).then(|| duration as f64 / MICROSECONDS_PER_SECOND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescales_pts() {
        assert_eq!(pts_to_seconds(90_000, Rational::new(1, 90_000)), 1.0);
        assert_eq!(pts_to_seconds(50, Rational::new(1, 25)), 2.0);
    }

    #[test]
    fn container_timestamps_are_microseconds() {
        assert_eq!(seconds_to_container_timestamp(1.5), 1_500_000);
        assert_eq!(seconds_to_container_timestamp(-3.0), 0);
        assert_eq!(container_duration_seconds(2_000_000), Some(2.0));
        assert_eq!(container_duration_seconds(i64::MIN), None);
    }
}
