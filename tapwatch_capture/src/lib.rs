//! Capture and OCR backends for tapwatch.
//!
//! - `sim`: simulated counters and a whitelisting text reader, always built
//! - `tesseract`: OCR via the `tesseract` CLI on cleaned-up PNGs
//! - `screen`: desktop capture (feature `screen`)
pub mod error;
pub mod preprocess;
#[cfg(feature = "screen")]
pub mod screen;
pub mod sim;
pub mod tesseract;
pub mod util;

#[cfg(feature = "screen")]
pub use screen::ScreenCapture;
pub use sim::{SimCounter, SimulatedOcr, SimulatedScreen};
pub use tesseract::TesseractCli;
