//! Accepted slides.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

/// One accepted slide: a JPEG-encoded frame and where it came from.
///
/// The encoded bytes are reference counted, so cloning a slide (for events,
/// previews, or the final set) never copies the image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slide {
    index: usize,
    timestamp: Duration,
    score: Option<f64>,
    width: u32,
    height: u32,
    #[serde(skip)]
    jpeg: Arc<[u8]>,
}

impl Slide {
    pub(crate) fn new(
        index: usize,
        timestamp: Duration,
        score: Option<f64>,
        width: u32,
        height: u32,
        jpeg: Arc<[u8]>,
    ) -> Self {
        Self {
            index,
            timestamp,
            score,
            width,
            height,
            jpeg,
        }
    }

    /// Zero-based position in the slide set.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Timeline position the frame was captured at.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Difference against the previous slide. `None` for the first slide,
    /// which is accepted unconditionally.
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Encoded JPEG bytes.
    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    /// Shared handle to the encoded bytes.
    pub fn jpeg_shared(&self) -> Arc<[u8]> {
        Arc::clone(&self.jpeg)
    }
}

/// Ordered, capped collection of accepted slides.
///
/// Slides are in strictly increasing timestamp order. The set can only grow
/// inside the crate; callers receive it frozen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlideSet {
    slides: Vec<Slide>,
}

impl SlideSet {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slides: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, slide: Slide) {
        self.slides.push(slide);
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    pub fn last(&self) -> Option<&Slide> {
        self.slides.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Slide> {
        self.slides.iter()
    }

    pub fn as_slice(&self) -> &[Slide] {
        &self.slides
    }

    /// Capture timestamps in order.
    pub fn timestamps(&self) -> Vec<Duration> {
        self.slides.iter().map(Slide::timestamp).collect()
    }

    pub fn into_vec(self) -> Vec<Slide> {
        self.slides
    }
}

impl<'a> IntoIterator for &'a SlideSet {
    type Item = &'a Slide;
    type IntoIter = std::slice::Iter<'a, Slide>;

    fn into_iter(self) -> Self::IntoIter {
        self.slides.iter()
    }
}

impl IntoIterator for SlideSet {
    type Item = Slide;
    type IntoIter = std::vec::IntoIter<Slide>;

    fn into_iter(self) -> Self::IntoIter {
        self.slides.into_iter()
    }
}
