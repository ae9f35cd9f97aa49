//! Media sources backed by a blocking decoder.
//!
//! Decoders such as FFmpeg seek and decode synchronously. Calling them from
//! an `async fn` would block the task, and the deadline in
//! [`seek_with_timeout`](crate::seek_with_timeout) could never fire.
//! [`BlockingSource`] instead runs the decoder on a `tokio::task::spawn_blocking`
//! thread and talks to it over channels. The async side only awaits replies,
//! so a stalled decode is abandoned when its deadline passes.
//!
//! The decoder is created on the worker thread, so it does not need to be
//! [`Send`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use video2ppt::{BlockingMedia, BlockingSource, Frame, MediaInfo, MediaSource, Video2PptError};
//!
//! struct Still;
//!
//! impl BlockingMedia for Still {
//!     fn info(&self) -> MediaInfo {
//!         MediaInfo::default()
//!     }
//!
//!     fn seek(&mut self, target: f64) -> Result<f64, Video2PptError> {
//!         Ok(target)
//!     }
//!
//!     fn capture(&mut self, landed: f64) -> Result<Frame, Video2PptError> {
//!         Ok(Frame::filled(4, 4, [0, 0, 0, 255], Duration::from_secs_f64(landed)))
//!     }
//! }
//!
//! # async fn example() -> Result<(), Video2PptError> {
//! let mut source = BlockingSource::spawn(|| Ok(Still)).await?;
//! source.seek(12.0).await?;
//! assert_eq!(source.capture()?.timestamp(), Duration::from_secs(12));
//! # Ok(())
//! # }
//! ```

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use crate::error::Video2PptError;
use crate::format::ContainerFormat;
use crate::frame::Frame;
use crate::source::MediaSource;

/// What a blocking decoder knows about its media once opened.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MediaInfo {
    pub declared_duration: Option<f64>,
    pub format: ContainerFormat,
    pub width: u32,
    pub height: u32,
}

/// A synchronous decoder served by a [`BlockingSource`].
pub trait BlockingMedia {
    fn info(&self) -> MediaInfo;

    /// Seek to `target` seconds and return the settled position. May block
    /// for as long as decoding takes.
    fn seek(&mut self, target: f64) -> Result<f64, Video2PptError>;

    /// Draw the frame at the position the last seek settled on.
    fn capture(&mut self, landed: f64) -> Result<Frame, Video2PptError>;

    /// Release per-session state such as cached frames.
    fn end_session(&mut self) {}
}

type Settled = Result<(f64, Result<Frame, Video2PptError>), Video2PptError>;

enum Request {
    Seek {
        target: f64,
        reply: oneshot::Sender<Settled>,
    },
    EndSession,
}

/// A [`MediaSource`] whose seeks run on a blocking worker thread.
///
/// Each settled seek draws its frame on the worker as well, so
/// [`capture`](MediaSource::capture) never waits on the decoder. Seeks are
/// served in order; one whose caller has already given up is dropped without
/// being decoded. Dropping the source stops the worker once its current
/// request finishes.
#[derive(Debug)]
pub struct BlockingSource {
    requests: UnboundedSender<Request>,
    info: MediaInfo,
    position: f64,
    current: Option<Result<Frame, String>>,
}

impl BlockingSource {
    /// Open a decoder on a blocking worker thread with `open`, and serve it.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the error from `open`, or [`Video2PptError::WorkerStopped`] if
    /// the worker exits before reporting back.
    pub async fn spawn<B, F>(open: F) -> Result<Self, Video2PptError>
    where
        B: BlockingMedia + 'static,
        F: FnOnce() -> Result<B, Video2PptError> + Send + 'static,
    {
        let (requests, receiver) = tokio::sync::mpsc::unbounded_channel();
        let (ready, opened) = oneshot::channel();

        tokio::task::spawn_blocking(move || match open() {
            Ok(media) => {
                if ready.send(Ok(media.info())).is_ok() {
                    serve(media, receiver);
                }
            }
            Err(error) => {
                let _ = ready.send(Err(error));
            }
        });

        let info = opened
            .await
            .map_err(|_| Video2PptError::WorkerStopped("exited while opening".to_string()))??;
        log::debug!(
            "Media worker ready: {}x{}, format {}, declared duration {:?}",
            info.width,
            info.height,
            info.format,
            info.declared_duration
        );

        Ok(Self {
            requests,
            info,
            position: 0.0,
            current: None,
        })
    }

    pub fn info(&self) -> &MediaInfo {
        &self.info
    }
}

fn serve<B: BlockingMedia>(mut media: B, mut requests: UnboundedReceiver<Request>) {
    while let Some(request) = requests.blocking_recv() {
        match request {
            Request::Seek { target, reply } => {
                if reply.is_closed() {
                    continue;
                }
                let settled = media
                    .seek(target)
                    .map(|landed| (landed, media.capture(landed)));
                let _ = reply.send(settled);
            }
            Request::EndSession => media.end_session(),
        }
    }
    log::trace!("Media worker stopped");
}

impl MediaSource for BlockingSource {
    fn position(&self) -> f64 {
        self.position
    }

    async fn seek(&mut self, target: f64) -> Result<f64, Video2PptError> {
        let stopped = || Video2PptError::WorkerStopped(format!("while seeking to {target:.2}s"));

        self.current = None;
        let (reply, settled) = oneshot::channel();
        self.requests
            .send(Request::Seek { target, reply })
            .map_err(|_| stopped())?;
        let (landed, frame) = settled.await.map_err(|_| stopped())??;

        self.position = landed;
        self.current = Some(frame.map_err(|error| error.to_string()));
        Ok(landed)
    }

    fn capture(&mut self) -> Result<Frame, Video2PptError> {
        match &self.current {
            Some(Ok(frame)) => Ok(frame.clone()),
            Some(Err(reason)) => Err(Video2PptError::CaptureFailed(reason.clone())),
            None => Err(Video2PptError::CaptureFailed(
                "no frame before the first seek".to_string(),
            )),
        }
    }

    fn declared_duration(&self) -> Option<f64> {
        self.info.declared_duration
    }

    fn format(&self) -> ContainerFormat {
        self.info.format
    }

    fn end_session(&mut self) {
        self.current = None;
        let _ = self.requests.send(Request::EndSession);
    }
}
