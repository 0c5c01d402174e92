use tapwatch_traits::{CaptureFailure, OcrFailure};
use thiserror::Error;

/// Why raw OCR text could not become a number.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("reading has no digits")]
    Empty,
    #[error("reading is not a number of the field's type")]
    NonNumeric,
    #[error("reading is outside the field's domain")]
    OutOfDomain,
}

impl ParseFailure {
    pub fn name(self) -> &'static str {
        match self {
            ParseFailure::Empty => "empty",
            ParseFailure::NonNumeric => "non-numeric",
            ParseFailure::OutOfDomain => "out-of-domain",
        }
    }
}

/// Why a parsed value was refused by the validator.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("timestamp not after the last sample")]
    NonCausal,
    #[error("implied rate is implausible")]
    ImplausibleSpike,
    #[error("value dropped on a field that never resets")]
    Regression,
}

impl Rejection {
    pub fn name(self) -> &'static str {
        match self {
            Rejection::NonCausal => "non-causal",
            Rejection::ImplausibleSpike => "implausible-spike",
            Rejection::Regression => "regression",
        }
    }
}

/// A capture or OCR call that produced no text this cycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorFailure {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureFailure),
    #[error("ocr failed: {0}")]
    Ocr(#[from] OcrFailure),
    #[error("collaborator call timed out")]
    Timeout,
    #[error("reading worker is gone")]
    WorkerGone,
}

impl CollaboratorFailure {
    pub fn name(&self) -> &'static str {
        match self {
            CollaboratorFailure::Capture(CaptureFailure::WindowNotFound(_)) => "window-not-found",
            CollaboratorFailure::Capture(CaptureFailure::RegionInvalid(_)) => "region-invalid",
            CollaboratorFailure::Capture(CaptureFailure::Timeout) => "capture-timeout",
            CollaboratorFailure::Ocr(OcrFailure::NoTextDetected) => "no-text-detected",
            CollaboratorFailure::Ocr(OcrFailure::EngineError(_)) => "engine-error",
            CollaboratorFailure::Ocr(OcrFailure::Timeout) => "ocr-timeout",
            CollaboratorFailure::Timeout => "timeout",
            CollaboratorFailure::WorkerGone => "worker-gone",
        }
    }
}

/// Last problem seen on one field; surfaced in reports, never fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("could not parse {raw:?}: {failure}")]
    Parse { failure: ParseFailure, raw: String },
    #[error("rejected {raw:?}: {reason}")]
    Rejected { reason: Rejection, raw: String },
    #[error(transparent)]
    Collaborator(#[from] CollaboratorFailure),
}

impl FieldError {
    pub fn name(&self) -> &'static str {
        match self {
            FieldError::Parse { failure, .. } => failure.name(),
            FieldError::Rejected { reason, .. } => reason.name(),
            FieldError::Collaborator(c) => c.name(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("capture/ocr failed for {cycles} consecutive cycles")]
    CollaboratorFailures { cycles: u32 },
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },
    #[error("no field has a usable capture region")]
    NoCapturableFields,
    #[error("unknown field: {0}")]
    UnknownField(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing capture backend")]
    MissingCapture,
    #[error("missing ocr recognizer")]
    MissingRecognizer,
    #[error("no fields configured")]
    NoFields,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
