//! Plausibility checks for a newly parsed value against a field's history.

use crate::buffer::{Sample, TimeSeriesBuffer};
use crate::error::Rejection;
use crate::estimator::{EstimatorCfg, estimate_run};
use crate::util::secs_between;

/// Direction a field is allowed to move in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Only grows, except for occasional resets (prestige, new run).
    #[default]
    NondecreasingUntilReset,
    /// Only grows; a drop is always a misread.
    Nondecreasing,
    /// Either direction.
    Free,
}

impl Policy {
    pub fn is_monotonic(self) -> bool {
        !matches!(self, Policy::Free)
    }

    pub fn name(self) -> &'static str {
        match self {
            Policy::NondecreasingUntilReset => "nondecreasing-until-reset",
            Policy::Nondecreasing => "nondecreasing",
            Policy::Free => "free",
        }
    }
}

/// Verdict on one candidate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accept,
    /// Accepted, and it starts a new run.
    AcceptAsReset,
    Reject(Rejection),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorCfg {
    /// Absolute jitter tolerated without classifying a change.
    pub noise_abs: f64,
    /// Jitter relative to the last value.
    pub noise_rel: f64,
    /// Multiple of the current rate a step may imply before it is a spike.
    pub spike_factor: f64,
    /// Multiple of the rate dispersion added to the spike threshold.
    pub spread_k: f64,
    /// Floor for the spike threshold, per second.
    pub min_plausible_rate: f64,
    /// A step no larger than this fraction of the last value is never a
    /// spike, whatever the current rate.
    pub min_spike_step_rel: f64,
    /// Hard ceiling on any implied rate, per second.
    pub max_rate: f64,
    /// Consistent spike rejections in a row before the field rebaselines.
    /// Zero disables rebaselining.
    pub rebaseline_after: u32,
}

impl Default for ValidatorCfg {
    fn default() -> Self {
        Self {
            noise_abs: 0.0,
            noise_rel: 0.001,
            spike_factor: 5.0,
            spread_k: 3.0,
            min_plausible_rate: 0.0,
            min_spike_step_rel: 0.5,
            max_rate: 1e9,
            rebaseline_after: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    policy: Policy,
    cfg: ValidatorCfg,
    estimator: EstimatorCfg,
}

impl Validator {
    pub fn new(policy: Policy, cfg: ValidatorCfg, estimator: EstimatorCfg) -> Self {
        Self {
            policy,
            cfg,
            estimator,
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn cfg(&self) -> &ValidatorCfg {
        &self.cfg
    }

    /// Changes at or below this are jitter.
    pub fn tolerance(&self, last: f64) -> f64 {
        self.cfg.noise_abs.max(self.cfg.noise_rel * last.abs())
    }

    /// Largest rate per second a step may imply given the current run.
    /// Only the hard ceiling applies until the run has a confident estimate.
    pub fn max_plausible_rate(&self, buffer: &TimeSeriesBuffer) -> f64 {
        let run = buffer.current_run();
        match estimate_run(&run, &self.estimator, self.policy) {
            Some(est) if !est.low_confidence => (self.cfg.spike_factor * est.per_sec.abs()
                + self.cfg.spread_k * est.dispersion)
                .max(self.cfg.min_plausible_rate)
                .min(self.cfg.max_rate),
            _ => self.cfg.max_rate,
        }
    }

    /// Spike threshold for a step away from `last` over `dt_secs`. Never
    /// below the relative step floor, never above `max_rate`.
    fn spike_ceiling(&self, buffer: &TimeSeriesBuffer, last: Sample, dt_secs: f64) -> f64 {
        let step_floor = self.cfg.min_spike_step_rel * last.value.abs() / dt_secs;
        self.max_plausible_rate(buffer)
            .max(step_floor)
            .min(self.cfg.max_rate)
    }

    /// Classify `value` observed at `t_ms`. Pure with respect to `buffer`.
    pub fn validate(&self, value: f64, t_ms: u64, buffer: &TimeSeriesBuffer) -> Outcome {
        let Some(last) = buffer.last_sample() else {
            return Outcome::Accept;
        };
        if t_ms <= last.t_ms {
            return Outcome::Reject(Rejection::NonCausal);
        }

        let delta = value - last.value;
        if delta.abs() <= self.tolerance(last.value) {
            return Outcome::Accept;
        }
        if delta < 0.0 {
            match self.policy {
                Policy::NondecreasingUntilReset => return Outcome::AcceptAsReset,
                Policy::Nondecreasing => return Outcome::Reject(Rejection::Regression),
                Policy::Free => {}
            }
        }

        let dt_secs = secs_between(last.t_ms, t_ms);
        let implied = delta.abs() / dt_secs;
        if implied > self.spike_ceiling(buffer, last, dt_secs) {
            Outcome::Reject(Rejection::ImplausibleSpike)
        } else {
            Outcome::Accept
        }
    }
}
