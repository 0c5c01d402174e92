use std::time::Duration;

use tapwatch_traits::{CaptureFailure, OcrFailure};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("process timed out after {0:?}")]
    Timeout(Duration),
    #[error("process exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("image error: {0}")]
    Image(String),
    #[error("screen error: {0}")]
    Screen(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BackendError>;

impl From<image::ImageError> for BackendError {
    fn from(e: image::ImageError) -> Self {
        Self::Image(e.to_string())
    }
}

impl From<BackendError> for OcrFailure {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Timeout(_) => Self::Timeout,
            other => Self::EngineError(other.to_string()),
        }
    }
}

impl From<BackendError> for CaptureFailure {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Timeout(_) => Self::Timeout,
            other => Self::RegionInvalid(other.to_string()),
        }
    }
}
