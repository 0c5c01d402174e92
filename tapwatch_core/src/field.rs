//! One tracked on-screen number and everything the session keeps about it.

use tapwatch_traits::{OcrHints, Region};

use crate::buffer::{BufferCfg, Sample, TimeSeriesBuffer};
use crate::error::{CollaboratorFailure, FieldError, ParseFailure, Rejection};
use crate::estimator::{EstimatorCfg, RateEstimate, estimate};
use crate::parser::{FormatHints, ValueDomain, parse};
use crate::projection::{Projection, project};
use crate::report::{FieldReport, FieldStats, TargetProjection};
use crate::util::secs_between;
use crate::validator::{Outcome, Policy, Validator, ValidatorCfg};

/// Static definition of a field.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedField {
    pub name: String,
    pub region: Region,
    pub policy: Policy,
    pub domain: ValueDomain,
    pub format: FormatHints,
    pub ocr: OcrHints,
    pub validation: ValidatorCfg,
    pub buffer: BufferCfg,
    pub targets: Vec<f64>,
}

impl TrackedField {
    /// A field with default parsing and validation settings.
    pub fn new(name: impl Into<String>, region: Region) -> Self {
        Self {
            name: name.into(),
            region,
            policy: Policy::default(),
            domain: ValueDomain::default(),
            format: FormatHints::default(),
            ocr: OcrHints::default(),
            validation: ValidatorCfg::default(),
            buffer: BufferCfg::default(),
            targets: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_targets(mut self, targets: impl Into<Vec<f64>>) -> Self {
        self.targets = targets.into();
        self
    }

    pub fn with_validation(mut self, validation: ValidatorCfg) -> Self {
        self.validation = validation;
        self
    }
}

/// OCR text read for a field, stamped at capture time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReading {
    pub text: String,
    pub t_ms: u64,
}

/// What happened to one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ingest {
    Accepted(Sample),
    Reset(Sample),
    Rebaselined(Sample),
    Rejected(Rejection),
    Unparsable(ParseFailure),
}

/// Parse, validate, and store readings for one field.
#[derive(Debug, Clone)]
pub struct FieldPipeline {
    field: TrackedField,
    validator: Validator,
    buffer: TimeSeriesBuffer,
    estimator: EstimatorCfg,
    stats: FieldStats,
    last_error: Option<FieldError>,
    spike_streak: Vec<Sample>,
}

impl FieldPipeline {
    pub fn new(field: TrackedField, estimator: EstimatorCfg) -> Self {
        let validator = Validator::new(field.policy, field.validation.clone(), estimator.clone());
        let buffer = TimeSeriesBuffer::new(field.policy, field.buffer.clone());
        Self {
            field,
            validator,
            buffer,
            estimator,
            stats: FieldStats::default(),
            last_error: None,
            spike_streak: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.field.name
    }

    pub fn field(&self) -> &TrackedField {
        &self.field
    }

    pub fn buffer(&self) -> &TimeSeriesBuffer {
        &self.buffer
    }

    pub fn stats(&self) -> FieldStats {
        self.stats
    }

    pub fn last_error(&self) -> Option<&FieldError> {
        self.last_error.as_ref()
    }

    pub fn estimate(&self) -> Option<RateEstimate> {
        estimate(&self.buffer, &self.estimator)
    }

    /// Run one reading through parse, validate and append.
    pub fn ingest(&mut self, reading: &RawReading) -> Ingest {
        self.stats.consecutive_failures = 0;

        let value = match parse(&reading.text, &self.field.format, &self.field.domain) {
            Ok(v) => v,
            Err(failure) => {
                self.stats.parse_failures += 1;
                tracing::warn!(field = %self.field.name, raw = %reading.text, reason = failure.name(), "unparsable reading");
                self.last_error = Some(FieldError::Parse {
                    failure,
                    raw: reading.text.clone(),
                });
                return Ingest::Unparsable(failure);
            }
        };

        let sample = Sample {
            t_ms: reading.t_ms,
            value,
        };
        let outcome = self.validator.validate(value, reading.t_ms, &self.buffer);
        match outcome {
            Outcome::Accept => {
                self.buffer.append(outcome, sample);
                self.accepted();
                tracing::debug!(field = %self.field.name, value, t_ms = sample.t_ms, "sample accepted");
                Ingest::Accepted(sample)
            }
            Outcome::AcceptAsReset => {
                let from = self.buffer.last_sample().map(|s| s.value);
                self.buffer.append(outcome, sample);
                self.accepted();
                self.stats.resets += 1;
                tracing::info!(field = %self.field.name, from = ?from, to = value, "reset detected; new run");
                Ingest::Reset(sample)
            }
            Outcome::Reject(reason) => {
                self.stats.rejected += 1;
                tracing::warn!(field = %self.field.name, raw = %reading.text, value, reason = reason.name(), "reading rejected");
                self.last_error = Some(FieldError::Rejected {
                    reason,
                    raw: reading.text.clone(),
                });
                if reason == Rejection::ImplausibleSpike && self.note_spike(sample) {
                    self.rebaseline(sample);
                    return Ingest::Rebaselined(sample);
                }
                Ingest::Rejected(reason)
            }
        }
    }

    /// Count a cycle in which no text could be read for this field.
    pub fn record_failure(&mut self, failure: CollaboratorFailure) {
        self.stats.collaborator_failures += 1;
        self.stats.consecutive_failures += 1;
        tracing::warn!(
            field = %self.field.name,
            reason = failure.name(),
            consecutive = self.stats.consecutive_failures,
            "no reading this cycle: {failure}"
        );
        self.last_error = Some(FieldError::Collaborator(failure));
    }

    /// Replace the definition; history and counters start over.
    pub fn reconfigure(&mut self, field: TrackedField) {
        tracing::info!(field = %field.name, "field reconfigured; buffer cleared");
        *self = Self::new(field, self.estimator.clone());
    }

    pub fn report(&self) -> FieldReport {
        let current_value = self.buffer.last_sample().map(|s| s.value);
        let rate = self.estimate();
        let projections = self
            .field
            .targets
            .iter()
            .map(|&target| TargetProjection {
                target,
                projection: current_value.map_or(Projection::Unavailable, |current| {
                    project(target, current, rate.as_ref())
                }),
            })
            .collect();
        FieldReport {
            name: self.field.name.clone(),
            current_value,
            rate,
            projections,
            last_error: self.last_error.clone(),
            run_len: self.buffer.run_len(),
            stats: self.stats,
        }
    }

    fn accepted(&mut self) {
        self.stats.accepted += 1;
        self.last_error = None;
        self.spike_streak.clear();
    }

    /// Track consecutive spike rejections; true once they form a
    /// consistent sequence long enough to trust.
    fn note_spike(&mut self, sample: Sample) -> bool {
        let needed = self.field.validation.rebaseline_after as usize;
        if needed == 0 {
            return false;
        }
        if let Some(prev) = self.spike_streak.last()
            && !self.consistent(*prev, sample)
        {
            self.spike_streak.clear();
        }
        self.spike_streak.push(sample);
        self.spike_streak.len() >= needed
    }

    fn consistent(&self, prev: Sample, next: Sample) -> bool {
        if next.t_ms <= prev.t_ms {
            return false;
        }
        let delta = next.value - prev.value;
        if self.field.policy.is_monotonic() && delta < -self.validator.tolerance(prev.value) {
            return false;
        }
        delta.abs() / secs_between(prev.t_ms, next.t_ms) <= self.field.validation.max_rate
    }

    fn rebaseline(&mut self, sample: Sample) {
        let from = self.buffer.last_sample().map(|s| s.value);
        self.buffer.rebaseline(sample);
        self.stats.accepted += 1;
        self.stats.rebaselines += 1;
        self.spike_streak.clear();
        tracing::info!(
            field = %self.field.name,
            from = ?from,
            to = sample.value,
            "consistent spikes; rebaselined to new level"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{HistoryEntry, ResetKind};

    fn pipeline(policy: Policy) -> FieldPipeline {
        let field = TrackedField::new("gold", Region::new("Game", 0, 0, 10, 10))
            .with_policy(policy)
            .with_targets([200.0]);
        FieldPipeline::new(field, EstimatorCfg::default())
    }

    fn read(text: &str, t_ms: u64) -> RawReading {
        RawReading {
            text: text.to_string(),
            t_ms,
        }
    }

    #[test]
    fn parse_failure_is_recorded_not_stored() {
        let mut p = pipeline(Policy::NondecreasingUntilReset);
        assert_eq!(p.ingest(&read("---", 0)), Ingest::Unparsable(ParseFailure::Empty));
        assert_eq!(p.stats().parse_failures, 1);
        assert_eq!(p.last_error().map(FieldError::name), Some("empty"));
        assert_eq!(p.buffer().run_len(), 0);
    }

    #[test]
    fn accept_clears_last_error() {
        let mut p = pipeline(Policy::NondecreasingUntilReset);
        p.record_failure(CollaboratorFailure::Timeout);
        assert_eq!(p.stats().consecutive_failures, 1);
        p.ingest(&read("100", 0));
        assert!(p.last_error().is_none());
        assert_eq!(p.stats().consecutive_failures, 0);
        assert_eq!(p.stats().collaborator_failures, 1);
    }

    #[test]
    fn consistent_spikes_rebaseline() {
        let mut p = pipeline(Policy::NondecreasingUntilReset);
        for (i, text) in ["100", "110", "120", "130"].iter().enumerate() {
            p.ingest(&read(text, i as u64 * 1_000));
        }
        assert_eq!(
            p.ingest(&read("1,000,000", 4_000)),
            Ingest::Rejected(Rejection::ImplausibleSpike)
        );
        assert_eq!(
            p.ingest(&read("1,000,010", 5_000)),
            Ingest::Rejected(Rejection::ImplausibleSpike)
        );
        let third = p.ingest(&read("1,000,020", 6_000));
        assert!(matches!(third, Ingest::Rebaselined(s) if s.value == 1_000_020.0));
        assert_eq!(p.stats().rebaselines, 1);
        assert_eq!(p.stats().resets, 0);
        assert_eq!(p.buffer().current_run().len(), 1);
        assert!(p.buffer().full_history().iter().any(|e| matches!(
            e,
            HistoryEntry::Reset(ev) if ev.kind == ResetKind::Rebaseline && ev.to_value == 1_000_020.0
        )));
        assert_eq!(p.ingest(&read("1,000,030", 7_000)), Ingest::Accepted(Sample { t_ms: 7_000, value: 1_000_030.0 }));
    }

    #[test]
    fn growth_after_flat_readings_stays_in_one_run() {
        let mut p = pipeline(Policy::NondecreasingUntilReset);
        let texts = ["100", "100", "110", "120", "130", "140", "150"];
        for (i, text) in texts.iter().enumerate() {
            let outcome = p.ingest(&read(text, i as u64 * 5_000));
            assert!(matches!(outcome, Ingest::Accepted(_)), "{text}: {outcome:?}");
        }
        let stats = p.stats();
        assert_eq!((stats.rejected, stats.resets, stats.rebaselines), (0, 0, 0));
        assert_eq!(p.buffer().run_len(), texts.len());
        let rate = p.estimate().expect("rate");
        assert!((rate.per_sec - 2.0).abs() < 1e-9, "{}", rate.per_sec);
    }

    #[test]
    fn growth_resumes_after_long_plateau() {
        let mut p = pipeline(Policy::NondecreasingUntilReset);
        let mut t = 0;
        for text in ["100", "110", "120", "120", "120", "120", "120", "120", "130", "140"] {
            let outcome = p.ingest(&read(text, t));
            assert!(matches!(outcome, Ingest::Accepted(_)), "{text} at {t}: {outcome:?}");
            t += 5_000;
        }
        assert_eq!(p.stats().rejected, 0);
        assert_eq!(p.buffer().closed_runs(), 0);
    }

    #[test]
    fn inconsistent_spikes_do_not_rebaseline() {
        let mut p = pipeline(Policy::NondecreasingUntilReset);
        for (i, text) in ["100", "110", "120", "130"].iter().enumerate() {
            p.ingest(&read(text, i as u64 * 1_000));
        }
        p.ingest(&read("900000", 4_000));
        p.ingest(&read("5000", 5_000));
        // 5000 after 900000 is a drop on a monotonic field: streak restarts
        let third = p.ingest(&read("900010", 6_000));
        assert_eq!(third, Ingest::Rejected(Rejection::ImplausibleSpike));
        assert_eq!(p.stats().rebaselines, 0);
    }

    #[test]
    fn report_projects_every_target() {
        let mut p = pipeline(Policy::NondecreasingUntilReset);
        for (i, text) in ["100", "105", "110", "115"].iter().enumerate() {
            p.ingest(&read(text, i as u64 * 1_000));
        }
        let r = p.report();
        assert_eq!(r.current_value, Some(115.0));
        assert_eq!(r.run_len, 4);
        let eta = r.projections[0].projection.seconds().expect("eta");
        assert!((eta - 17.0).abs() < 1e-9, "{eta}");
    }

    #[test]
    fn empty_field_reports_unavailable() {
        let p = pipeline(Policy::NondecreasingUntilReset);
        let r = p.report();
        assert_eq!(r.current_value, None);
        assert_eq!(r.projections[0].projection, Projection::Unavailable);
    }

    #[test]
    fn reconfigure_clears_history() {
        let mut p = pipeline(Policy::NondecreasingUntilReset);
        p.ingest(&read("100", 0));
        p.ingest(&read("101", 1_000));
        let field = p.field().clone().with_targets([500.0]);
        p.reconfigure(field);
        assert_eq!(p.buffer().run_len(), 0);
        assert_eq!(p.stats(), FieldStats::default());
        assert_eq!(p.field().targets, vec![500.0]);
    }
}
