//! `From` implementations bridging `tapwatch_config` types to `tapwatch_core` types.

use std::time::Duration;

use tapwatch_traits::{OcrHints, Region};

use crate::buffer::BufferCfg;
use crate::estimator::{EstimatorCfg, Smoothing};
use crate::field::TrackedField;
use crate::parser::{FormatHints, ValueDomain};
use crate::session::SessionCfg;
use crate::validator::{Policy, ValidatorCfg};

// ── Enums ────────────────────────────────────────────────────────────────────

impl From<tapwatch_config::Policy> for Policy {
    fn from(p: tapwatch_config::Policy) -> Self {
        match p {
            tapwatch_config::Policy::NondecreasingUntilReset => Policy::NondecreasingUntilReset,
            tapwatch_config::Policy::Nondecreasing => Policy::Nondecreasing,
            tapwatch_config::Policy::Free => Policy::Free,
        }
    }
}

impl From<tapwatch_config::Smoothing> for Smoothing {
    fn from(s: tapwatch_config::Smoothing) -> Self {
        match s {
            tapwatch_config::Smoothing::WeightedMedian => Smoothing::WeightedMedian,
            tapwatch_config::Smoothing::WeightedMean => Smoothing::WeightedMean,
            tapwatch_config::Smoothing::LeastSquares => Smoothing::LeastSquares,
        }
    }
}

// ── Session / estimator ──────────────────────────────────────────────────────

impl From<&tapwatch_config::SessionCfg> for SessionCfg {
    fn from(c: &tapwatch_config::SessionCfg) -> Self {
        Self {
            interval: Duration::from_millis(c.interval_ms),
            collaborator_timeout: Duration::from_millis(c.collaborator_timeout_ms),
            failure_threshold: c.failure_threshold,
            control_poll: Duration::from_millis(c.control_poll_ms),
        }
    }
}

impl From<&tapwatch_config::EstimatorCfg> for EstimatorCfg {
    fn from(c: &tapwatch_config::EstimatorCfg) -> Self {
        Self {
            smoothing: c.smoothing.into(),
            half_life_ms: c.half_life_ms,
            min_samples: c.min_samples,
        }
    }
}

// ── Per-field settings ───────────────────────────────────────────────────────

impl From<&tapwatch_config::DomainCfg> for ValueDomain {
    fn from(c: &tapwatch_config::DomainCfg) -> Self {
        Self {
            min: c.min,
            max: c.max,
            integer: c.integer,
        }
    }
}

impl From<&tapwatch_config::FormatCfg> for FormatHints {
    fn from(c: &tapwatch_config::FormatCfg) -> Self {
        Self {
            decimal_separator: c.decimal_separator,
            // validated to be empty or exactly one character
            thousands_separator: c.thousands_separator.chars().next(),
            suffixes: c.suffixes.clone(),
            repair_confusables: c.repair_confusables,
        }
    }
}

impl From<&tapwatch_config::ValidationCfg> for ValidatorCfg {
    fn from(c: &tapwatch_config::ValidationCfg) -> Self {
        Self {
            noise_abs: c.noise_abs,
            noise_rel: c.noise_rel,
            spike_factor: c.spike_factor,
            spread_k: c.spread_k,
            min_plausible_rate: c.min_plausible_rate,
            min_spike_step_rel: c.min_spike_step_rel,
            max_rate: c.max_rate,
            rebaseline_after: c.rebaseline_after,
        }
    }
}

impl From<&tapwatch_config::BufferCfg> for BufferCfg {
    fn from(c: &tapwatch_config::BufferCfg) -> Self {
        Self {
            capacity: c.capacity,
            window_ms: c.window_ms,
            max_closed_runs: c.max_closed_runs,
        }
    }
}

/// OCR whitelist for a field: digits, its separators, and its suffix letters
/// in both cases.
pub fn ocr_charset(format: &FormatHints) -> String {
    let mut charset: String = ('0'..='9').collect();
    charset.push(format.decimal_separator);
    charset.extend(format.thousands_separator);
    for (suffix, _) in &format.suffixes {
        for c in suffix.chars().flat_map(|c| c.to_lowercase().chain(c.to_uppercase())) {
            if !charset.contains(c) {
                charset.push(c);
            }
        }
    }
    charset
}

/// Build a field definition; the region's window falls back to
/// `[capture].window`.
pub fn tracked_field(
    f: &tapwatch_config::FieldCfg,
    capture: &tapwatch_config::CaptureCfg,
) -> TrackedField {
    let format = FormatHints::from(&f.format);
    let charset = capture
        .charset
        .clone()
        .unwrap_or_else(|| ocr_charset(&format));
    TrackedField {
        name: f.name.clone(),
        region: Region::new(
            f.region
                .window
                .clone()
                .unwrap_or_else(|| capture.window.clone()),
            f.region.x,
            f.region.y,
            f.region.width,
            f.region.height,
        ),
        policy: f.policy.into(),
        domain: ValueDomain::from(&f.domain),
        format,
        ocr: OcrHints {
            charset,
            language: capture.language.clone(),
        },
        validation: ValidatorCfg::from(&f.validation),
        buffer: BufferCfg::from(&f.buffer),
        targets: f.targets.clone(),
    }
}

/// Every configured field, in file order.
pub fn tracked_fields(cfg: &tapwatch_config::Config) -> Vec<TrackedField> {
    cfg.fields
        .iter()
        .map(|f| tracked_field(f, &cfg.capture))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML: &str = r#"
[capture]
window = "Tap Ninja"
language = "deu"

[[field]]
name = "gold"
policy = "free"
targets = [10.0]
region = { x = 1, y = 2, width = 3, height = 4 }
format = { thousands_separator = "", suffixes = { K = 1e3 } }

[[field]]
name = "gems"
region = { x = 0, y = 0, width = 9, height = 9, window = "Other" }
"#;

    #[test]
    fn maps_fields_with_window_fallback() {
        let cfg = tapwatch_config::load_toml(TOML).expect("parse");
        let fields = tracked_fields(&cfg);
        assert_eq!(fields.len(), 2);

        let gold = &fields[0];
        assert_eq!(gold.region, Region::new("Tap Ninja", 1, 2, 3, 4));
        assert_eq!(gold.policy, Policy::Free);
        assert_eq!(gold.format.thousands_separator, None);
        assert_eq!(gold.ocr.language, "deu");
        assert_eq!(gold.ocr.charset, "0123456789.kK");
        assert_eq!(gold.targets, vec![10.0]);

        assert_eq!(fields[1].region.target, "Other");
        assert_eq!(fields[1].policy, Policy::NondecreasingUntilReset);
    }

    #[test]
    fn session_cfg_uses_durations() {
        let cfg = tapwatch_config::load_toml("[session]\ninterval_ms = 250\n").expect("parse");
        let s = SessionCfg::from(&cfg.session);
        assert_eq!(s.interval, Duration::from_millis(250));
        assert_eq!(s.failure_threshold, 5);
    }
}
