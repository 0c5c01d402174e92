//! Snapshots published after every sampling cycle.

use crate::error::{FieldError, SessionError};
use crate::estimator::RateEstimate;
use crate::projection::Projection;
use crate::session::SessionState;

/// Per-field counters since the field was created or reconfigured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldStats {
    pub accepted: u64,
    pub rejected: u64,
    pub resets: u64,
    pub rebaselines: u64,
    pub parse_failures: u64,
    pub collaborator_failures: u64,
    /// Collaborator failures since the last successful read.
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetProjection {
    pub target: f64,
    pub projection: Projection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldReport {
    pub name: String,
    pub current_value: Option<f64>,
    pub rate: Option<RateEstimate>,
    pub projections: Vec<TargetProjection>,
    pub last_error: Option<FieldError>,
    pub run_len: usize,
    pub stats: FieldStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Milliseconds since the session epoch when the report was built.
    pub at_ms: u64,
    pub state: SessionState,
    /// Consecutive cycles in which every field's collaborator call failed.
    pub failed_cycles: u32,
    pub fault: Option<SessionError>,
    pub fields: Vec<FieldReport>,
}

impl CycleReport {
    pub fn field(&self, name: &str) -> Option<&FieldReport> {
        self.fields.iter().find(|f| f.name == name)
    }
}
