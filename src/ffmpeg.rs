//! FFmpeg-backed media source and log level control.
//!
//! [`FfmpegSource`] implements [`MediaSource`] over a local video file,
//! decoding on a blocking worker thread. A seek is a container-level seek to the nearest keyframe followed by
//! decoding forward to the first frame at or past the target, so the
//! settled position is the presentation time of the frame that would be
//! shown. Seeks past the end settle on the last decodable frame.
//!
//! # Example
//!
//! ```no_run
//! use video2ppt::{ExtractOptions, FfmpegLogLevel, FfmpegSource, SlideExtractor};
//!
//! # async fn example() -> Result<(), video2ppt::Video2PptError> {
//! video2ppt::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//!
//! let mut source = FfmpegSource::open("lecture.mp4").await?;
//! let slides = SlideExtractor::new(ExtractOptions::new()).extract(&mut source).await?;
//! # Ok(())
//! # }
//! ```
//!
//! FFmpeg's own console output is separate from the `log` records this
//! crate emits; [`set_ffmpeg_log_level`] only controls the former.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ffmpeg_next::{
    Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::log::Level,
};

use crate::blocking::{BlockingMedia, BlockingSource, MediaInfo};
use crate::error::Video2PptError;
use crate::format::ContainerFormat;
use crate::frame::Frame;
use crate::source::MediaSource;
use crate::utilities::{
    container_duration_seconds, frame_to_rgba_buffer, pts_to_seconds,
    seconds_to_container_timestamp,
};

/// FFmpeg internal log verbosity.
///
/// Maps onto FFmpeg's `AV_LOG_*` levels, most quiet first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    Quiet,
    Panic,
    Fatal,
    Error,
    Warning,
    Info,
    Verbose,
    Debug,
    Trace,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }

    /// Level matching a `log` crate filter, used by the CLI so one flag
    /// drives both outputs.
    pub fn from_log_filter(filter: log::LevelFilter) -> Self {
        match filter {
            log::LevelFilter::Off => FfmpegLogLevel::Quiet,
            log::LevelFilter::Error => FfmpegLogLevel::Error,
            log::LevelFilter::Warn => FfmpegLogLevel::Warning,
            log::LevelFilter::Info => FfmpegLogLevel::Info,
            log::LevelFilter::Debug => FfmpegLogLevel::Debug,
            log::LevelFilter::Trace => FfmpegLogLevel::Trace,
        }
    }
}

/// Set FFmpeg's console log level.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// A video file decoded with FFmpeg.
///
/// Demuxing and decoding run on a blocking worker thread (see
/// [`BlockingSource`]), so a seek that stalls inside FFmpeg still hits its
/// deadline. Each settled seek is converted to RGBA at the video's native
/// size on that thread.
#[derive(Debug)]
pub struct FfmpegSource {
    path: PathBuf,
    inner: BlockingSource,
}

impl FfmpegSource {
    /// Open a video file and start a decoder for its best video stream.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Video2PptError::FfmpegError`] if FFmpeg cannot open the
    /// file or it has no decodable video stream.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, Video2PptError> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening video: {}", path.display());

        let worker_path = path.clone();
        let inner = BlockingSource::spawn(move || FfmpegDecoder::open(&worker_path)).await?;
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Native frame size.
    pub fn dimensions(&self) -> (u32, u32) {
        let info = self.inner.info();
        (info.width, info.height)
    }
}

impl MediaSource for FfmpegSource {
    fn position(&self) -> f64 {
        self.inner.position()
    }

    async fn seek(&mut self, target: f64) -> Result<f64, Video2PptError> {
        self.inner.seek(target).await
    }

    fn capture(&mut self) -> Result<Frame, Video2PptError> {
        self.inner.capture()
    }

    fn declared_duration(&self) -> Option<f64> {
        self.inner.declared_duration()
    }

    fn format(&self) -> ContainerFormat {
        self.inner.format()
    }

    fn end_session(&mut self) {
        self.inner.end_session();
    }
}

/// Decoder state, owned by the worker thread.
struct FfmpegDecoder {
    input: Input,
    stream_index: usize,
    time_base: Rational,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    info: MediaInfo,
    frame_tolerance: f64,
    current: Option<VideoFrame>,
}

impl FfmpegDecoder {
    fn open(path: &Path) -> Result<Self, Video2PptError> {
        ffmpeg_next::init().map_err(|error| {
            Video2PptError::FfmpegError(format!("FFmpeg initialisation failed: {error}"))
        })?;
        let input = ffmpeg_next::format::input(path).map_err(|error| {
            Video2PptError::FfmpegError(format!("cannot open {}: {error}", path.display()))
        })?;

        let stream = input.streams().best(Type::Video).ok_or_else(|| {
            Video2PptError::FfmpegError(format!("{} has no video stream", path.display()))
        })?;
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let frame_rate = stream.avg_frame_rate();
        let frame_tolerance = if frame_rate.numerator() > 0 && frame_rate.denominator() > 0 {
            0.5 * frame_rate.denominator() as f64 / frame_rate.numerator() as f64
        } else {
            0.02
        };

        let decoder = CodecContext::from_parameters(stream.parameters())?
            .decoder()
            .video()?;
        let width = decoder.width();
        let height = decoder.height();
        let scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGBA,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;

        let format = match ContainerFormat::from_path(path) {
            ContainerFormat::Unknown => container_format_from_name(input.format().name()),
            known => known,
        };
        let info = MediaInfo {
            declared_duration: container_duration_seconds(input.duration()),
            format,
            width,
            height,
        };
        log::debug!("Video stream {stream_index} of {}", path.display());

        Ok(Self {
            input,
            stream_index,
            time_base,
            decoder,
            scaler,
            info,
            frame_tolerance,
            current: None,
        })
    }

    /// Seek to the keyframe before `target`, then decode forward to the first
    /// frame at or past it. Past the end, settle on the last frame.
    fn decode_at(&mut self, target: f64) -> Result<(VideoFrame, f64), Video2PptError> {
        let target = match self.info.declared_duration {
            Some(duration) => target.clamp(0.0, duration),
            None => target.max(0.0),
        };
        let failed = |reason: String| Video2PptError::SeekFailed { target, reason };

        let timestamp = seconds_to_container_timestamp(target);
        self.input
            .seek(timestamp, ..timestamp)
            .map_err(|error| failed(error.to_string()))?;
        self.decoder.flush();

        let time_base = self.time_base;
        let mut decoded = VideoFrame::empty();
        let mut last: Option<(VideoFrame, f64)> = None;

        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .map_err(|error| failed(format!("decoding failed: {error}")))?;
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let seconds = frame_seconds(&decoded, time_base);
                if seconds + self.frame_tolerance >= target {
                    return Ok((decoded, seconds));
                }
                last = Some((decoded.clone(), seconds));
            }
        }

        self.decoder
            .send_eof()
            .map_err(|error| failed(format!("draining failed: {error}")))?;
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let seconds = frame_seconds(&decoded, time_base);
            if seconds + self.frame_tolerance >= target {
                return Ok((decoded, seconds));
            }
            last = Some((decoded.clone(), seconds));
        }

        last.ok_or_else(|| failed("no frame could be decoded".to_string()))
    }
}

impl BlockingMedia for FfmpegDecoder {
    fn info(&self) -> MediaInfo {
        self.info
    }

    fn seek(&mut self, target: f64) -> Result<f64, Video2PptError> {
        let (frame, landed) = self.decode_at(target)?;
        self.current = Some(frame);
        Ok(landed)
    }

    fn capture(&mut self, landed: f64) -> Result<Frame, Video2PptError> {
        let Some(decoded) = self.current.as_ref() else {
            return Err(Video2PptError::CaptureFailed(
                "no frame at the current position".to_string(),
            ));
        };

        let mut rgba = VideoFrame::empty();
        self.scaler.run(decoded, &mut rgba)?;
        let (width, height) = (self.info.width, self.info.height);
        let pixels = frame_to_rgba_buffer(&rgba, width, height);
        Frame::from_rgba(width, height, pixels, Duration::from_secs_f64(landed))
    }

    fn end_session(&mut self) {
        self.current = None;
    }
}

fn frame_seconds(frame: &VideoFrame, time_base: Rational) -> f64 {
    let pts = frame.timestamp().or_else(|| frame.pts()).unwrap_or(0);
    pts_to_seconds(pts, time_base).max(0.0)
}

/// Map an FFmpeg demuxer name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`) to a
/// container format.
fn container_format_from_name(name: &str) -> ContainerFormat {
    name.split(',')
        .map(ContainerFormat::from_extension)
        .find(|format| *format != ContainerFormat::Unknown)
        .unwrap_or_default()
}
