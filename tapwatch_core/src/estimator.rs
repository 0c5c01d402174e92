//! Smoothed rate of change over the current run.
//!
//! Each strategy weights observations by age with an exponential decay, so
//! recent behaviour dominates while older samples still damp OCR noise.

use crate::buffer::{Sample, TimeSeriesBuffer};
use crate::util::{MILLIS_PER_SEC, secs_between};
use crate::validator::Policy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Smoothing {
    /// Weighted median of consecutive pairwise rates.
    #[default]
    WeightedMedian,
    /// Weighted mean of consecutive pairwise rates.
    WeightedMean,
    /// Weighted least-squares slope over the samples.
    LeastSquares,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimatorCfg {
    pub smoothing: Smoothing,
    /// Age at which an observation's weight halves.
    pub half_life_ms: u64,
    /// Fewer samples than this mark the estimate as low confidence.
    pub min_samples: usize,
}

impl Default for EstimatorCfg {
    fn default() -> Self {
        Self {
            smoothing: Smoothing::WeightedMedian,
            half_life_ms: 60_000,
            min_samples: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateEstimate {
    /// Units per second.
    pub per_sec: f64,
    /// Samples the estimate was computed from.
    pub samples: usize,
    /// Weighted mean absolute deviation of the pairwise rates, per second.
    pub dispersion: f64,
    pub span_ms: u64,
    /// Timestamp of the newest contributing sample.
    pub computed_at_ms: u64,
    pub low_confidence: bool,
}

impl RateEstimate {
    pub fn per_minute(&self) -> f64 {
        self.per_sec * 60.0
    }
}

/// Rate over the buffer's current run.
pub fn estimate(buffer: &TimeSeriesBuffer, cfg: &EstimatorCfg) -> Option<RateEstimate> {
    estimate_run(&buffer.current_run(), cfg, buffer.policy())
}

/// Rate over `run`, which must be ordered by strictly increasing time.
/// `None` when fewer than two samples exist.
pub fn estimate_run(run: &[Sample], cfg: &EstimatorCfg, policy: Policy) -> Option<RateEstimate> {
    let (first, newest) = match run {
        [first, .., last] => (*first, *last),
        _ => return None,
    };

    let pairs: Vec<(f64, f64)> = run
        .windows(2)
        .map(|w| {
            let rate = (w[1].value - w[0].value) / secs_between(w[0].t_ms, w[1].t_ms);
            let mid_ms = w[0].t_ms + (w[1].t_ms - w[0].t_ms) / 2;
            (rate, decay(newest.t_ms - mid_ms, cfg.half_life_ms))
        })
        .collect();

    let mut per_sec = match cfg.smoothing {
        Smoothing::WeightedMedian => weighted_median(&pairs),
        Smoothing::WeightedMean => weighted_mean(&pairs),
        Smoothing::LeastSquares => least_squares(run, newest.t_ms, cfg.half_life_ms)
            .unwrap_or_else(|| weighted_mean(&pairs)),
    };
    if policy.is_monotonic() && per_sec < 0.0 {
        per_sec = 0.0;
    }
    if !per_sec.is_finite() {
        tracing::warn!(samples = run.len(), "rate estimate is not finite; discarding");
        return None;
    }

    let total: f64 = pairs.iter().map(|(_, w)| w).sum();
    let dispersion = if total > 0.0 {
        pairs.iter().map(|(r, w)| w * (r - per_sec).abs()).sum::<f64>() / total
    } else {
        0.0
    };

    let est = RateEstimate {
        per_sec,
        samples: run.len(),
        dispersion,
        span_ms: newest.t_ms - first.t_ms,
        computed_at_ms: newest.t_ms,
        low_confidence: run.len() < cfg.min_samples,
    };
    tracing::trace!(per_sec, dispersion, samples = est.samples, "rate estimate");
    Some(est)
}

fn decay(age_ms: u64, half_life_ms: u64) -> f64 {
    if half_life_ms == 0 {
        return 1.0;
    }
    (-(age_ms as f64) / half_life_ms as f64).exp2()
}

fn weighted_mean(pairs: &[(f64, f64)]) -> f64 {
    let total: f64 = pairs.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return pairs.iter().map(|(r, _)| r).sum::<f64>() / pairs.len() as f64;
    }
    pairs.iter().map(|(r, w)| r * w).sum::<f64>() / total
}

/// Lower weighted median: the smallest rate at which the cumulative weight
/// reaches half the total.
fn weighted_median(pairs: &[(f64, f64)]) -> f64 {
    let mut sorted = pairs.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    let total: f64 = sorted.iter().map(|(_, w)| w).sum();
    let half = total / 2.0;
    let mut acc = 0.0;
    for (rate, w) in &sorted {
        acc += w;
        if acc >= half {
            return *rate;
        }
    }
    sorted.last().map_or(0.0, |(r, _)| *r)
}

fn least_squares(run: &[Sample], newest_ms: u64, half_life_ms: u64) -> Option<f64> {
    let points: Vec<(f64, f64, f64)> = run
        .iter()
        .map(|s| {
            let age = newest_ms - s.t_ms;
            let x = -(age as f64) / MILLIS_PER_SEC;
            (x, s.value, decay(age, half_life_ms))
        })
        .collect();
    let total: f64 = points.iter().map(|p| p.2).sum();
    if total <= 0.0 {
        return None;
    }
    let x_bar = points.iter().map(|p| p.2 * p.0).sum::<f64>() / total;
    let y_bar = points.iter().map(|p| p.2 * p.1).sum::<f64>() / total;
    let sxx: f64 = points.iter().map(|p| p.2 * (p.0 - x_bar).powi(2)).sum();
    let sxy: f64 = points
        .iter()
        .map(|p| p.2 * (p.0 - x_bar) * (p.1 - y_bar))
        .sum();
    (sxx > 0.0).then(|| sxy / sxx)
}
