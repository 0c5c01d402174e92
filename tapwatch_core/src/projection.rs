//! Time-to-target from the current value and rate.

use crate::estimator::RateEstimate;
use crate::util::format_eta;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Target will be reached in `seconds` at the current rate.
    Eta { seconds: f64 },
    /// Target is at or below the current value.
    Infeasible,
    /// No trustworthy positive rate to project with.
    Unavailable,
}

impl Projection {
    pub fn seconds(&self) -> Option<f64> {
        match self {
            Projection::Eta { seconds } => Some(*seconds),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Projection::Eta { seconds } => format_eta(*seconds),
            Projection::Infeasible => "reached".to_string(),
            Projection::Unavailable => "n/a".to_string(),
        }
    }
}

/// Project when `target` will be reached.
///
/// A target already reached is reported as [`Projection::Infeasible`] even
/// when no estimate exists yet.
pub fn project(target: f64, current: f64, estimate: Option<&RateEstimate>) -> Projection {
    if target <= current {
        return Projection::Infeasible;
    }
    match estimate {
        Some(est) if !est.low_confidence && est.per_sec > 0.0 => Projection::Eta {
            seconds: (target - current) / est.per_sec,
        },
        _ => Projection::Unavailable,
    }
}
