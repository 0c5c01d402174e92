#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core reading pipeline (capture-agnostic).
//!
//! This crate turns OCR text scraped from a game screen into validated time
//! series, smoothed rates, and time-to-target projections. Pixels and OCR
//! engines stay behind `tapwatch_traits::Capture` and
//! `tapwatch_traits::Recognizer`.
//!
//! ## Architecture
//!
//! - **Parsing**: raw text to a number in the field's domain (`parser`)
//! - **Validation**: causality, jitter, resets, spikes (`validator`)
//! - **Storage**: per-field runs split at resets (`buffer`)
//! - **Estimation**: decay-weighted rate over the current run (`estimator`)
//! - **Projection**: time to each target (`projection`)
//! - **Session**: `Idle/Sampling/Paused/Error` state machine driving one
//!   cycle over all fields (`session`, `runner`), with collaborators owned
//!   by a worker thread (`sampler`)
//!
//! Timestamps are milliseconds since the session epoch, taken from the
//! injected `Clock`.

pub mod buffer;
pub mod builder;
pub mod conversions;
pub mod error;
pub mod estimator;
pub mod field;
pub mod mocks;
pub mod parser;
pub mod projection;
pub mod report;
pub mod runner;
pub mod sampler;
pub mod session;
pub mod util;
pub mod validator;

pub use buffer::{BufferCfg, HistoryEntry, ResetEvent, ResetKind, Sample, TimeSeriesBuffer};
pub use builder::SessionBuilder;
pub use error::{
    BuildError, CollaboratorFailure, FieldError, ParseFailure, Rejection, Result, SessionError,
};
pub use estimator::{EstimatorCfg, RateEstimate, Smoothing, estimate};
pub use field::{FieldPipeline, Ingest, RawReading, TrackedField};
pub use parser::{FormatHints, ValueDomain, parse};
pub use projection::{Projection, project};
pub use report::{CycleReport, FieldReport, FieldStats, TargetProjection};
pub use runner::{RunEnd, RunSummary, run};
pub use session::{SessionCfg, SessionControl, SessionController, SessionState};
pub use validator::{Outcome, Policy, Validator, ValidatorCfg};
