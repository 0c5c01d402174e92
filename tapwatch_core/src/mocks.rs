//! Test and helper collaborators for tapwatch_core

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tapwatch_traits::{Capture, CaptureFailure, Frame, OcrFailure, OcrHints, Recognizer, Region};

/// A capture backend that always fails; useful when pipelines are fed
/// recorded text directly.
pub struct NoopCapture;

impl Capture for NoopCapture {
    fn capture(&mut self, region: &Region, _timeout: Duration) -> Result<Frame, CaptureFailure> {
        Err(CaptureFailure::WindowNotFound(region.target.clone()))
    }
}

/// Recognizer for frames built with [`Frame::text`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRecognizer;

impl Recognizer for TextRecognizer {
    fn recognize(
        &mut self,
        frame: &Frame,
        _hints: &OcrHints,
        _timeout: Duration,
    ) -> Result<String, OcrFailure> {
        let text = frame
            .as_text()
            .ok_or_else(|| OcrFailure::EngineError("frame carries no text".into()))?
            .trim();
        if text.is_empty() {
            return Err(OcrFailure::NoTextDetected);
        }
        Ok(text.to_string())
    }
}

/// Capture that plays back a fixed script of readings per region.
/// An exhausted or unknown region reports `WindowNotFound`.
#[derive(Debug, Default)]
pub struct ScriptedCapture {
    scripts: HashMap<Region, VecDeque<Result<String, CaptureFailure>>>,
}

impl ScriptedCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script<I>(mut self, region: &Region, steps: I) -> Self
    where
        I: IntoIterator<Item = Result<String, CaptureFailure>>,
    {
        self.scripts
            .entry(region.clone())
            .or_default()
            .extend(steps);
        self
    }

    pub fn with_texts(self, region: &Region, texts: &[&str]) -> Self {
        self.with_script(region, texts.iter().map(|t| Ok((*t).to_string())))
    }
}

impl Capture for ScriptedCapture {
    fn capture(&mut self, region: &Region, _timeout: Duration) -> Result<Frame, CaptureFailure> {
        match self.scripts.get_mut(region).and_then(VecDeque::pop_front) {
            Some(Ok(text)) => Ok(Frame::text(&text)),
            Some(Err(e)) => Err(e),
            None => Err(CaptureFailure::WindowNotFound(region.target.clone())),
        }
    }
}
