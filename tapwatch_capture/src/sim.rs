//! Simulated game screen and OCR engine.
//!
//! Each registered region shows a counter that grows at a fixed rate on the
//! injected clock. Captures can periodically spend the counter (reset to
//! zero), misread it (duplicated leading digit) or come back blank, so the
//! whole pipeline can be exercised without a display.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tapwatch_traits::{
    Capture, CaptureFailure, Clock, Frame, OcrFailure, OcrHints, Recognizer, Region,
};

/// Behaviour of one simulated counter. Every `*_every` of 0 disables that
/// effect; otherwise it fires on every Nth capture of the region.
#[derive(Debug, Clone, PartialEq)]
pub struct SimCounter {
    pub start: f64,
    pub rate_per_sec: f64,
    pub reset_every: u32,
    pub glitch_every: u32,
    pub blank_every: u32,
}

impl Default for SimCounter {
    fn default() -> Self {
        Self {
            start: 0.0,
            rate_per_sec: 1.0,
            reset_every: 0,
            glitch_every: 0,
            blank_every: 0,
        }
    }
}

#[derive(Debug)]
struct CounterState {
    counter: SimCounter,
    captures: u64,
    base: f64,
    base_ms: u64,
}

impl CounterState {
    fn value_at(&self, now_ms: u64) -> f64 {
        let secs = now_ms.saturating_sub(self.base_ms) as f64 / 1000.0;
        (self.base + self.counter.rate_per_sec * secs).max(0.0)
    }
}

fn fires(n: u64, every: u32) -> bool {
    every > 0 && n % u64::from(every) == 0
}

/// Render an integer with `,` thousands grouping, as games usually do.
pub fn group_thousands(v: u64) -> String {
    let digits = v.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub struct SimulatedScreen {
    counters: HashMap<Region, CounterState>,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    failing: bool,
}

impl std::fmt::Debug for SimulatedScreen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedScreen")
            .field("counters", &self.counters.len())
            .field("failing", &self.failing)
            .finish_non_exhaustive()
    }
}

impl SimulatedScreen {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let epoch = clock.now();
        Self {
            counters: HashMap::new(),
            clock,
            epoch,
            failing: false,
        }
    }

    #[must_use]
    pub fn with_counter(mut self, region: Region, counter: SimCounter) -> Self {
        self.counters.insert(
            region,
            CounterState {
                base: counter.start,
                counter,
                captures: 0,
                base_ms: 0,
            },
        );
        self
    }

    /// Make every capture fail as if the game window were gone.
    #[must_use]
    pub fn failing(mut self, failing: bool) -> Self {
        self.failing = failing;
        self
    }

    /// True counter value (before glitches) at `now_ms` since creation.
    pub fn value_at(&self, region: &Region, now_ms: u64) -> Option<f64> {
        self.counters.get(region).map(|c| c.value_at(now_ms))
    }
}

impl Capture for SimulatedScreen {
    fn capture(&mut self, region: &Region, _timeout: Duration) -> Result<Frame, CaptureFailure> {
        if self.failing {
            return Err(CaptureFailure::WindowNotFound(region.target.clone()));
        }
        if !region.is_valid() {
            return Err(CaptureFailure::RegionInvalid(format!(
                "{}x{} at ({}, {})",
                region.width, region.height, region.x, region.y
            )));
        }
        let now_ms = self.clock.ms_since(self.epoch);
        let Some(state) = self.counters.get_mut(region) else {
            return Err(CaptureFailure::WindowNotFound(region.target.clone()));
        };
        state.captures += 1;
        let n = state.captures;

        if fires(n, state.counter.reset_every) {
            tracing::debug!(window = %region.target, "simulated spend");
            state.base = 0.0;
            state.base_ms = now_ms;
        }
        if fires(n, state.counter.blank_every) {
            return Ok(Frame::text(""));
        }
        let value = state.value_at(now_ms).floor();
        let mut text = group_thousands(value as u64);
        if fires(n, state.counter.glitch_every)
            && let Some(first) = text.chars().next()
        {
            text.insert(0, first);
        }
        Ok(Frame::text(&text))
    }
}

/// Reads frames rendered by [`SimulatedScreen`], keeping only characters
/// allowed by the hints, as a whitelisting OCR engine would.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedOcr;

impl Recognizer for SimulatedOcr {
    fn recognize(
        &mut self,
        frame: &Frame,
        hints: &OcrHints,
        _timeout: Duration,
    ) -> Result<String, OcrFailure> {
        let text = frame
            .as_text()
            .ok_or_else(|| OcrFailure::EngineError("not a simulated frame".to_string()))?;
        let kept: String = text
            .chars()
            .filter(|c| hints.charset.is_empty() || c.is_whitespace() || hints.charset.contains(*c))
            .collect();
        let kept = kept.trim();
        if kept.is_empty() {
            return Err(OcrFailure::NoTextDetected);
        }
        Ok(kept.to_string())
    }
}
