//! Collaborator boundaries for the tapwatch pipeline.
//!
//! The core never captures pixels or runs OCR itself. It depends on the
//! `Capture` and `Recognizer` traits defined here, and on `Clock` for all
//! timing, so backends can be swapped at configuration time and tests can
//! run without a screen.
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::Duration;
use thiserror::Error;

/// Screen rectangle plus the identifier of the window it belongs to.
///
/// Opaque to the core: only the capture backend interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Region {
    /// Window title or other backend-specific target identifier.
    pub target: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(target: impl Into<String>, x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            target: target.into(),
            x,
            y,
            width,
            height,
        }
    }

    /// A region is usable when it covers at least one pixel.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Captured image of one region. Pixel layout is agreed between a capture
/// backend and its recognizer; the core only moves frames around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl Frame {
    /// A frame that carries already-rendered text instead of pixels.
    /// Used by simulated backends and tests.
    pub fn text(text: &str) -> Self {
        Self {
            width: u32::try_from(text.len()).unwrap_or(u32::MAX),
            height: 1,
            bytes: text.as_bytes().to_vec(),
        }
    }

    /// Reads back a frame built with [`Frame::text`].
    pub fn as_text(&self) -> Option<&str> {
        if self.height != 1 {
            return None;
        }
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// Pre-processing hints handed to the OCR engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrHints {
    /// Characters the engine should restrict itself to.
    pub charset: String,
    /// Engine language code, e.g. "eng".
    pub language: String,
}

impl Default for OcrHints {
    fn default() -> Self {
        Self {
            charset: "0123456789.,KMBTkmbt".to_string(),
            language: "eng".to_string(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureFailure {
    #[error("window not found: {0}")]
    WindowNotFound(String),
    #[error("capture region invalid: {0}")]
    RegionInvalid(String),
    #[error("capture timed out")]
    Timeout,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OcrFailure {
    #[error("no text detected")]
    NoTextDetected,
    #[error("ocr engine error: {0}")]
    EngineError(String),
    #[error("ocr timed out")]
    Timeout,
}

/// Grabs the pixels of a region. Implementations should give up after
/// `timeout`; the core enforces the same bound from the outside.
pub trait Capture {
    fn capture(&mut self, region: &Region, timeout: Duration) -> Result<Frame, CaptureFailure>;
}

/// Turns a captured frame into raw text.
pub trait Recognizer {
    fn recognize(
        &mut self,
        frame: &Frame,
        hints: &OcrHints,
        timeout: Duration,
    ) -> Result<String, OcrFailure>;
}

impl<T: Capture + ?Sized> Capture for Box<T> {
    fn capture(&mut self, region: &Region, timeout: Duration) -> Result<Frame, CaptureFailure> {
        (**self).capture(region, timeout)
    }
}

impl<T: Recognizer + ?Sized> Recognizer for Box<T> {
    fn recognize(
        &mut self,
        frame: &Frame,
        hints: &OcrHints,
        timeout: Duration,
    ) -> Result<String, OcrFailure> {
        (**self).recognize(frame, hints, timeout)
    }
}
