//! Capture and OCR backend selection from `[capture]`.

use std::sync::Arc;

use tapwatch_capture::{SimCounter, SimulatedOcr, SimulatedScreen};
use tapwatch_config::{Backend, Config, SimulateCfg};
use tapwatch_core::TrackedField;
use tapwatch_traits::{Capture, MonotonicClock, Recognizer};

#[cfg(not(feature = "screen"))]
use crate::error_fmt::CliError;

/// Makes every simulated capture fail (window not found) when set to
/// anything but `0`.
pub const SIM_FAIL_ENV: &str = "TAPWATCH_TEST_SIM_FAIL";

pub type Backends = (Box<dyn Capture + Send>, Box<dyn Recognizer + Send>);

pub fn sim_counter(c: &SimulateCfg) -> SimCounter {
    SimCounter {
        start: c.start,
        rate_per_sec: c.rate_per_sec,
        reset_every: c.reset_every,
        glitch_every: c.glitch_every,
        blank_every: c.blank_every,
    }
}

fn sim_fail_requested() -> bool {
    std::env::var_os(SIM_FAIL_ENV).is_some_and(|v| !v.is_empty() && v != "0")
}

/// `fields` must be the tracked fields built from `cfg`, in file order.
pub fn build(cfg: &Config, fields: &[TrackedField]) -> eyre::Result<Backends> {
    match cfg.capture.backend {
        Backend::Simulated => {
            let mut screen = SimulatedScreen::new(Arc::new(MonotonicClock::new()))
                .failing(sim_fail_requested());
            for (fc, field) in cfg.fields.iter().zip(fields) {
                let counter = fc.simulate.as_ref().map(sim_counter).unwrap_or_default();
                screen = screen.with_counter(field.region.clone(), counter);
            }
            tracing::debug!(fields = fields.len(), "simulated backend");
            let backends: Backends = (Box::new(screen), Box::new(SimulatedOcr));
            Ok(backends)
        }
        Backend::Screen => screen_backends(cfg),
    }
}

#[cfg(feature = "screen")]
fn screen_backends(cfg: &Config) -> eyre::Result<Backends> {
    use tapwatch_capture::{ScreenCapture, TesseractCli};
    tracing::debug!(tesseract = %cfg.capture.tesseract_path, "screen backend");
    let backends: Backends = (
        Box::new(ScreenCapture::new()),
        Box::new(TesseractCli::new(&cfg.capture.tesseract_path)),
    );
    Ok(backends)
}

#[cfg(not(feature = "screen"))]
fn screen_backends(_cfg: &Config) -> eyre::Result<Backends> {
    Err(CliError::Config(
        "[capture].backend = \"screen\" requires a build with --features screen".to_string(),
    )
    .into())
}
