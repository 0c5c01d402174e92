use std::time::Duration;

use screenshots::Screen;
use tapwatch_traits::{Capture, CaptureFailure, Frame, Region};

use crate::error::BackendError;

/// Captures desktop pixels with the `screenshots` crate.
///
/// Region coordinates are absolute desktop coordinates; the region's target
/// is only used in error messages. Frames are RGBA8.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScreenCapture;

impl ScreenCapture {
    pub fn new() -> Self {
        Self
    }

    fn grab(region: &Region) -> Result<Frame, BackendError> {
        let screen = Screen::from_point(region.x, region.y)
            .map_err(|e| BackendError::Screen(format!("no display at ({}, {}): {e}", region.x, region.y)))?;
        let info = screen.display_info;
        let image = screen
            .capture_area(
                region.x - info.x,
                region.y - info.y,
                region.width,
                region.height,
            )
            .map_err(|e| BackendError::Screen(e.to_string()))?;
        Ok(Frame {
            width: image.width(),
            height: image.height(),
            bytes: image.into_raw(),
        })
    }
}

impl Capture for ScreenCapture {
    fn capture(&mut self, region: &Region, _timeout: Duration) -> Result<Frame, CaptureFailure> {
        if !region.is_valid() {
            return Err(CaptureFailure::RegionInvalid(format!(
                "{}x{} at ({}, {})",
                region.width, region.height, region.x, region.y
            )));
        }
        Self::grab(region).map_err(|e| {
            tracing::debug!(window = %region.target, error = %e, "screen capture failed");
            CaptureFailure::WindowNotFound(format!("{}: {e}", region.target))
        })
    }
}
