use proptest::prelude::*;
use tapwatch_core::{
    BufferCfg, EstimatorCfg, HistoryEntry, Outcome, Policy, ResetKind, Sample, TimeSeriesBuffer,
    Validator, ValidatorCfg,
};

fn policy_strategy() -> impl Strategy<Value = Policy> {
    prop_oneof![
        Just(Policy::NondecreasingUntilReset),
        Just(Policy::Nondecreasing),
        Just(Policy::Free),
    ]
}

prop_compose! {
    // Timestamps may repeat or go backwards (dt_ms can be negative) to
    // exercise the causality check.
    fn readings_strategy()(
        steps in prop::collection::vec((-2_000i64..10_000, 0.0f64..1e6), 1..120),
    ) -> Vec<(u64, f64)> {
        let mut t: i64 = 1_000_000;
        steps
            .into_iter()
            .map(|(dt, v)| {
                t = (t + dt).max(0);
                (t as u64, v)
            })
            .collect()
    }
}

fn feed(policy: Policy, capacity: usize, readings: &[(u64, f64)]) -> TimeSeriesBuffer {
    let validator = Validator::new(policy, ValidatorCfg::default(), EstimatorCfg::default());
    let mut buffer = TimeSeriesBuffer::new(
        policy,
        BufferCfg {
            capacity,
            window_ms: None,
            max_closed_runs: 4,
        },
    );
    for &(t_ms, value) in readings {
        let outcome = validator.validate(value, t_ms, &buffer);
        buffer.append(outcome, Sample { t_ms, value });
    }
    buffer
}

proptest! {
    #[test]
    fn runs_are_time_ordered_and_monotonic(
        policy in policy_strategy(),
        capacity in 2usize..50,
        readings in readings_strategy(),
    ) {
        let buffer = feed(policy, capacity, &readings);

        let mut last_t: Option<u64> = None;
        let mut run: Vec<Sample> = Vec::new();
        let mut runs: Vec<Vec<Sample>> = Vec::new();
        for entry in buffer.full_history() {
            match entry {
                HistoryEntry::Sample(s) => {
                    if let Some(t) = last_t {
                        prop_assert!(s.t_ms > t, "timestamps must strictly increase");
                    }
                    last_t = Some(s.t_ms);
                    run.push(s);
                }
                HistoryEntry::Reset(ev) => {
                    prop_assert_eq!(policy, Policy::NondecreasingUntilReset, "unexpected reset {:?}", ev);
                    prop_assert_eq!(ev.kind, ResetKind::Drop);
                    prop_assert!(ev.to_value < ev.from_value, "reset must be a drop: {:?}", ev);
                    runs.push(std::mem::take(&mut run));
                }
            }
        }
        runs.push(run);

        for run in &runs {
            prop_assert!(run.len() <= capacity);
            if policy.is_monotonic() {
                for w in run.windows(2) {
                    prop_assert!(w[1].value >= w[0].value, "run decreased: {:?}", w);
                }
            }
        }
        prop_assert_eq!(buffer.current_run(), runs.last().cloned().unwrap_or_default());
    }

    #[test]
    fn validate_is_idempotent(
        policy in policy_strategy(),
        readings in readings_strategy(),
        probe_value in 0.0f64..1e6,
        probe_dt in 1u64..60_000,
    ) {
        let buffer = feed(policy, 100, &readings);
        let validator = Validator::new(policy, ValidatorCfg::default(), EstimatorCfg::default());
        let t = buffer.last_sample().map_or(0, |s| s.t_ms) + probe_dt;
        let first = validator.validate(probe_value, t, &buffer);
        let second = validator.validate(probe_value, t, &buffer);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn plateaus_and_modest_growth_stay_in_one_run(
        start in 1.0f64..1e4,
        // zero is a flat reading; otherwise the fraction the value grows by
        steps in prop::collection::vec(prop_oneof![Just(0.0f64), 0.0f64..0.4], 1..40),
    ) {
        let policy = Policy::NondecreasingUntilReset;
        let validator = Validator::new(policy, ValidatorCfg::default(), EstimatorCfg::default());
        let mut buffer = TimeSeriesBuffer::new(policy, BufferCfg::default());
        buffer.append(Outcome::Accept, Sample { t_ms: 0, value: start });

        let mut value = start;
        for (i, growth) in steps.iter().enumerate() {
            value += value * growth;
            let t_ms = (i as u64 + 1) * 5_000;
            let outcome = validator.validate(value, t_ms, &buffer);
            prop_assert_eq!(outcome, Outcome::Accept, "step {} to {}", i, value);
            buffer.append(outcome, Sample { t_ms, value });
        }
        prop_assert_eq!(buffer.run_len(), steps.len() + 1);
        prop_assert_eq!(buffer.resets_total(), 0);
    }
}
