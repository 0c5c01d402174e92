//! Accepted samples for one field, split into runs at resets.

use std::collections::VecDeque;

use crate::validator::{Outcome, Policy};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Milliseconds since the session epoch.
    pub t_ms: u64,
    pub value: f64,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetKind {
    /// The value dropped: a spend, prestige or new game.
    #[default]
    Drop,
    /// Repeated consistent spikes were taken as the new level.
    Rebaseline,
}

impl ResetKind {
    pub fn name(self) -> &'static str {
        match self {
            ResetKind::Drop => "drop",
            ResetKind::Rebaseline => "rebaseline",
        }
    }
}

/// Boundary between two runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResetEvent {
    pub t_ms: u64,
    pub from_value: f64,
    pub to_value: f64,
    pub kind: ResetKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HistoryEntry {
    Sample(Sample),
    Reset(ResetEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferCfg {
    /// Most samples kept in the current run.
    pub capacity: usize,
    /// Drop samples older than this relative to the newest one.
    pub window_ms: Option<u64>,
    pub max_closed_runs: usize,
}

impl Default for BufferCfg {
    fn default() -> Self {
        Self {
            capacity: 720,
            window_ms: None,
            max_closed_runs: 8,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Run {
    opened_by: Option<ResetEvent>,
    samples: VecDeque<Sample>,
}

#[derive(Debug, Clone)]
pub struct TimeSeriesBuffer {
    policy: Policy,
    cfg: BufferCfg,
    closed: VecDeque<Run>,
    current: Run,
    resets_total: u64,
}

impl TimeSeriesBuffer {
    pub fn new(policy: Policy, cfg: BufferCfg) -> Self {
        Self {
            policy,
            cfg,
            closed: VecDeque::new(),
            current: Run::default(),
            resets_total: 0,
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Store `sample` according to `outcome`. Returns whether it was stored.
    ///
    /// On monotonic fields an accepted in-tolerance dip is stored at the
    /// run's last value so runs never decrease.
    pub fn append(&mut self, outcome: Outcome, sample: Sample) -> bool {
        if matches!(outcome, Outcome::Reject(_)) {
            return false;
        }
        if let Some(last) = self.last_sample()
            && sample.t_ms <= last.t_ms
        {
            tracing::warn!(t_ms = sample.t_ms, last_t_ms = last.t_ms, "dropping non-causal sample");
            return false;
        }

        match (outcome, self.last_sample()) {
            (Outcome::AcceptAsReset, Some(last)) => self.open_run(last, sample, ResetKind::Drop),
            (_, Some(last)) if self.policy.is_monotonic() && sample.value < last.value => {
                self.current.samples.push_back(Sample {
                    t_ms: sample.t_ms,
                    value: last.value,
                });
            }
            _ => self.current.samples.push_back(sample),
        }
        self.evict();
        true
    }

    /// Start a new run at `sample`, which replaces the current level
    /// instead of continuing it. Returns whether it was stored.
    pub fn rebaseline(&mut self, sample: Sample) -> bool {
        match self.last_sample() {
            Some(last) if sample.t_ms <= last.t_ms => {
                tracing::warn!(t_ms = sample.t_ms, last_t_ms = last.t_ms, "dropping non-causal sample");
                false
            }
            Some(last) => {
                self.open_run(last, sample, ResetKind::Rebaseline);
                self.evict();
                true
            }
            None => self.append(Outcome::Accept, sample),
        }
    }

    fn open_run(&mut self, last: Sample, sample: Sample, kind: ResetKind) {
        let event = ResetEvent {
            t_ms: sample.t_ms,
            from_value: last.value,
            to_value: sample.value,
            kind,
        };
        let mut next = Run {
            opened_by: Some(event),
            samples: VecDeque::new(),
        };
        next.samples.push_back(sample);
        let previous = std::mem::replace(&mut self.current, next);
        self.closed.push_back(previous);
        self.resets_total += 1;
    }

    /// Copy of the samples since the last reset, oldest first.
    pub fn current_run(&self) -> Vec<Sample> {
        self.current.samples.iter().copied().collect()
    }

    /// Every retained sample and reset event, in time order.
    pub fn full_history(&self) -> Vec<HistoryEntry> {
        let mut out = Vec::new();
        for run in self.closed.iter().chain(std::iter::once(&self.current)) {
            if let Some(event) = run.opened_by {
                out.push(HistoryEntry::Reset(event));
            }
            out.extend(run.samples.iter().copied().map(HistoryEntry::Sample));
        }
        out
    }

    pub fn last_sample(&self) -> Option<Sample> {
        self.current.samples.back().copied()
    }

    pub fn run_len(&self) -> usize {
        self.current.samples.len()
    }

    pub fn closed_runs(&self) -> usize {
        self.closed.len()
    }

    /// Run boundaries of either kind seen since creation or the last
    /// [`clear`](Self::clear), including ones whose runs were evicted.
    pub fn resets_total(&self) -> u64 {
        self.resets_total
    }

    pub fn clear(&mut self) {
        self.closed.clear();
        self.current = Run::default();
        self.resets_total = 0;
    }

    fn evict(&mut self) {
        let capacity = self.cfg.capacity.max(1);
        while self.current.samples.len() > capacity {
            self.current.samples.pop_front();
        }

        if let (Some(window), Some(newest)) = (self.cfg.window_ms, self.last_sample()) {
            let cutoff = newest.t_ms.saturating_sub(window);
            trim_before(&mut self.current.samples, cutoff, 1);
            self.closed
                .retain(|run| run.samples.back().is_some_and(|s| s.t_ms >= cutoff));
            for run in &mut self.closed {
                trim_before(&mut run.samples, cutoff, 1);
            }
        }

        while self.closed.len() > self.cfg.max_closed_runs {
            self.closed.pop_front();
        }
        if let Some(run) = self.closed.back_mut() {
            while run.samples.len() > capacity {
                run.samples.pop_front();
            }
        }
    }
}

fn trim_before(samples: &mut VecDeque<Sample>, cutoff: u64, keep: usize) {
    while samples.len() > keep && samples.front().is_some_and(|s| s.t_ms < cutoff) {
        samples.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Rejection;

    fn s(t_ms: u64, value: f64) -> Sample {
        Sample { t_ms, value }
    }

    #[test]
    fn reset_closes_run_and_records_event() {
        let mut b = TimeSeriesBuffer::new(Policy::NondecreasingUntilReset, BufferCfg::default());
        assert!(b.append(Outcome::Accept, s(0, 100.0)));
        assert!(b.append(Outcome::Accept, s(1_000, 500.0)));
        assert!(b.append(Outcome::AcceptAsReset, s(2_000, 0.0)));

        assert_eq!(b.current_run(), vec![s(2_000, 0.0)]);
        assert_eq!(b.closed_runs(), 1);
        assert_eq!(b.resets_total(), 1);
        assert_eq!(
            b.full_history(),
            vec![
                HistoryEntry::Sample(s(0, 100.0)),
                HistoryEntry::Sample(s(1_000, 500.0)),
                HistoryEntry::Reset(ResetEvent {
                    t_ms: 2_000,
                    from_value: 500.0,
                    to_value: 0.0,
                    kind: ResetKind::Drop,
                }),
                HistoryEntry::Sample(s(2_000, 0.0)),
            ]
        );
    }

    #[test]
    fn rebaseline_is_marked_apart_from_a_drop() {
        let mut b = TimeSeriesBuffer::new(Policy::Nondecreasing, BufferCfg::default());
        b.append(Outcome::Accept, s(0, 100.0));
        assert!(!b.rebaseline(s(0, 9_000.0)));
        assert!(b.rebaseline(s(1_000, 9_000.0)));

        assert_eq!(b.current_run(), vec![s(1_000, 9_000.0)]);
        assert_eq!(b.resets_total(), 1);
        let events: Vec<ResetEvent> = b
            .full_history()
            .into_iter()
            .filter_map(|e| match e {
                HistoryEntry::Reset(ev) => Some(ev),
                HistoryEntry::Sample(_) => None,
            })
            .collect();
        assert_eq!(
            events,
            vec![ResetEvent {
                t_ms: 1_000,
                from_value: 100.0,
                to_value: 9_000.0,
                kind: ResetKind::Rebaseline,
            }]
        );
    }

    #[test]
    fn rejected_and_non_causal_samples_are_not_stored() {
        let mut b = TimeSeriesBuffer::new(Policy::Free, BufferCfg::default());
        assert!(b.append(Outcome::Accept, s(1_000, 1.0)));
        assert!(!b.append(Outcome::Reject(Rejection::ImplausibleSpike), s(2_000, 9.0)));
        assert!(!b.append(Outcome::Accept, s(1_000, 2.0)));
        assert_eq!(b.current_run(), vec![s(1_000, 1.0)]);
    }

    #[test]
    fn monotonic_dip_is_held_at_last_value() {
        let mut b = TimeSeriesBuffer::new(Policy::Nondecreasing, BufferCfg::default());
        b.append(Outcome::Accept, s(0, 1_000.0));
        b.append(Outcome::Accept, s(1_000, 999.0));
        assert_eq!(b.last_sample(), Some(s(1_000, 1_000.0)));

        let mut free = TimeSeriesBuffer::new(Policy::Free, BufferCfg::default());
        free.append(Outcome::Accept, s(0, 1_000.0));
        free.append(Outcome::Accept, s(1_000, 999.0));
        assert_eq!(free.last_sample(), Some(s(1_000, 999.0)));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let cfg = BufferCfg {
            capacity: 3,
            ..BufferCfg::default()
        };
        let mut b = TimeSeriesBuffer::new(Policy::Free, cfg);
        for i in 0..5u32 {
            b.append(Outcome::Accept, s(u64::from(i) * 1_000, f64::from(i)));
        }
        assert_eq!(
            b.current_run(),
            vec![s(2_000, 2.0), s(3_000, 3.0), s(4_000, 4.0)]
        );
    }

    #[test]
    fn window_keeps_newest_even_after_a_gap() {
        let cfg = BufferCfg {
            window_ms: Some(10_000),
            ..BufferCfg::default()
        };
        let mut b = TimeSeriesBuffer::new(Policy::NondecreasingUntilReset, cfg);
        b.append(Outcome::Accept, s(0, 1.0));
        b.append(Outcome::Accept, s(5_000, 2.0));
        b.append(Outcome::AcceptAsReset, s(6_000, 0.0));
        b.append(Outcome::Accept, s(60_000, 5.0));

        assert_eq!(b.current_run(), vec![s(60_000, 5.0)]);
        assert_eq!(b.closed_runs(), 0);
        assert_eq!(b.resets_total(), 1);
    }

    #[test]
    fn closed_runs_are_bounded() {
        let cfg = BufferCfg {
            max_closed_runs: 2,
            ..BufferCfg::default()
        };
        let mut b = TimeSeriesBuffer::new(Policy::NondecreasingUntilReset, cfg);
        let mut t = 0;
        for _ in 0..5 {
            b.append(Outcome::Accept, s(t, 10.0));
            b.append(Outcome::AcceptAsReset, s(t + 1_000, 0.0));
            t += 2_000;
        }
        assert_eq!(b.closed_runs(), 2);
        assert_eq!(b.resets_total(), 5);
    }

    #[test]
    fn clear_empties_everything() {
        let mut b = TimeSeriesBuffer::new(Policy::NondecreasingUntilReset, BufferCfg::default());
        b.append(Outcome::Accept, s(0, 1.0));
        b.append(Outcome::AcceptAsReset, s(1_000, 0.0));
        b.clear();
        assert!(b.full_history().is_empty());
        assert_eq!(b.last_sample(), None);
        assert_eq!(b.resets_total(), 0);
    }
}
