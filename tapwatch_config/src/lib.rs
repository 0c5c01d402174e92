#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and replay parsing for tapwatch.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Replay CSV loader enforces headers so recorded OCR text can be fed
//!   back through the pipeline offline.
use serde::Deserialize;
use serde::de::Deserializer;
use std::collections::{BTreeMap, HashSet};

/// Commented starter configuration written by `tapwatch init`.
pub const DEFAULT_CONFIG: &str = r#"# tapwatch configuration

[session]
# Time between capture cycles (ms). Minimum 100.
interval_ms = 5000
# Upper bound on a single capture + OCR call (ms).
collaborator_timeout_ms = 2000
# Consecutive fully failed cycles before the session enters Error.
failure_threshold = 5

[estimator]
# weighted-median | weighted-mean | least-squares
smoothing = "weighted-median"
half_life_ms = 60000
min_samples = 3

[capture]
# simulated | screen (screen requires the `screen` build feature)
backend = "simulated"
window = "Tap Ninja"
tesseract_path = "tesseract"
language = "eng"

[logging]
level = "info"
rotation = "never"

[[field]]
name = "gold"
policy = "nondecreasing-until-reset"
targets = [5000.0, 20000.0]
region = { x = 100, y = 40, width = 220, height = 36 }
domain = { min = 0.0, integer = true }
format = { decimal_separator = ".", thousands_separator = ",", suffixes = { K = 1e3, M = 1e6, B = 1e9 } }
simulate = { start = 100.0, rate_per_sec = 2.0, reset_every = 40, glitch_every = 7 }
"#;

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Counter only grows, except for explicit resets (spending).
    #[default]
    NondecreasingUntilReset,
    /// Counter only grows; drops are treated as noise.
    Nondecreasing,
    /// No monotonicity constraint.
    Free,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Smoothing {
    #[default]
    WeightedMedian,
    WeightedMean,
    LeastSquares,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Simulated,
    Screen,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionCfg {
    pub interval_ms: u64,
    pub collaborator_timeout_ms: u64,
    pub failure_threshold: u32,
    /// Granularity of pause/stop checks while waiting for the next cycle.
    pub control_poll_ms: u64,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            collaborator_timeout_ms: 2000,
            failure_threshold: 5,
            control_poll_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EstimatorCfg {
    pub smoothing: Smoothing,
    /// Age at which a pairwise rate counts half as much as the newest one.
    pub half_life_ms: u64,
    /// Below this many samples an estimate is low-confidence.
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CaptureCfg {
    pub backend: Backend,
    /// Default window identifier for regions that do not name their own.
    pub window: String,
    pub tesseract_path: String,
    pub language: String,
    /// Optional override of the OCR character whitelist.
    pub charset: Option<String>,
}

impl Default for CaptureCfg {
    fn default() -> Self {
        Self {
            backend: Backend::Simulated,
            window: "Tap Ninja".to_string(),
            tesseract_path: "tesseract".to_string(),
            language: "eng".to_string(),
            charset: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegionCfg {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Window identifier; falls back to `[capture].window`.
    #[serde(default)]
    pub window: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DomainCfg {
    pub min: f64,
    pub max: Option<f64>,
    pub integer: bool,
}

impl Default for DomainCfg {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: None,
            integer: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FormatCfg {
    pub decimal_separator: char,
    /// Empty string disables thousands grouping.
    pub thousands_separator: String,
    pub repair_confusables: bool,
    /// Suffix multipliers. Accepts either:
    /// - a table: { K = 1e3, M = 1e6 }
    /// - an array of pairs: [["K", 1e3], ["M", 1e6]]
    #[serde(deserialize_with = "de_suffixes")]
    pub suffixes: Vec<(String, f64)>,
}

impl Default for FormatCfg {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            thousands_separator: ",".to_string(),
            repair_confusables: true,
            suffixes: vec![
                ("K".to_string(), 1e3),
                ("M".to_string(), 1e6),
                ("B".to_string(), 1e9),
                ("T".to_string(), 1e12),
            ],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ValidationCfg {
    pub noise_abs: f64,
    pub noise_rel: f64,
    pub spike_factor: f64,
    pub spread_k: f64,
    pub min_plausible_rate: f64,
    /// Steps up to this fraction of the last value are never spikes.
    pub min_spike_step_rel: f64,
    /// Hard ceiling on value per second, used before any estimate exists.
    pub max_rate: f64,
    /// Consistent spike rejections before the new level is accepted (0 disables).
    pub rebaseline_after: u32,
}

impl Default for ValidationCfg {
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

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BufferCfg {
    pub capacity: usize,
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

/// Parameters of the simulated game counter behind a field.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulateCfg {
    pub start: f64,
    pub rate_per_sec: f64,
    /// Spend everything every N captures (0 disables).
    pub reset_every: u32,
    /// Inject an OCR misread every N captures (0 disables).
    pub glitch_every: u32,
    /// Return a blank read every N captures (0 disables).
    pub blank_every: u32,
}

impl Default for SimulateCfg {
    fn default() -> Self {
        Self {
            start: 0.0,
            rate_per_sec: 1.0,
            reset_every: 0,
            glitch_every: 0,
            blank_every: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FieldCfg {
    pub name: String,
    #[serde(default)]
    pub policy: Policy,
    #[serde(default)]
    pub targets: Vec<f64>,
    pub region: RegionCfg,
    #[serde(default)]
    pub domain: DomainCfg,
    #[serde(default)]
    pub format: FormatCfg,
    #[serde(default)]
    pub validation: ValidationCfg,
    #[serde(default)]
    pub buffer: BufferCfg,
    #[serde(default)]
    pub simulate: Option<SimulateCfg>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionCfg,
    #[serde(default)]
    pub estimator: EstimatorCfg,
    #[serde(default)]
    pub capture: CaptureCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(rename = "field", default)]
    pub fields: Vec<FieldCfg>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SuffixToml {
    Map(BTreeMap<String, f64>),
    List(Vec<SuffixEntry>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SuffixEntry {
    Tuple((String, f64)),
    Table { suffix: String, multiplier: f64 },
}

fn de_suffixes<'de, D>(deserializer: D) -> Result<Vec<(String, f64)>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<SuffixToml> = Option::deserialize(deserializer)?;
    let mut out = Vec::new();
    match opt {
        Some(SuffixToml::Map(m)) => out.extend(m),
        Some(SuffixToml::List(items)) => {
            for s in items {
                match s {
                    SuffixEntry::Tuple((k, v)) => out.push((k, v)),
                    SuffixEntry::Table { suffix, multiplier } => out.push((suffix, multiplier)),
                }
            }
        }
        None => {}
    }
    Ok(out)
}

/// One recorded OCR reading.
///
/// Expected headers:
/// t_ms,field,text
///
/// Example:
/// t_ms,field,text
/// 0,gold,"1,234"
/// 5000,gold,1.3K
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ReplayRow {
    pub t_ms: u64,
    pub field: String,
    pub text: String,
}

pub fn load_replay_csv(path: &std::path::Path) -> eyre::Result<Vec<ReplayRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open replay CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["t_ms", "field", "text"];
    let actual: Vec<String> = headers.iter().map(|s| s.trim().to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "replay CSV must have headers 't_ms,field,text', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<ReplayRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    Ok(rows)
}

fn finite_non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

impl FieldCfg {
    fn validate(&self) -> eyre::Result<()> {
        let name = &self.name;
        if name.trim().is_empty() {
            eyre::bail!("field.name must not be empty");
        }

        // Region
        if self.region.width == 0 || self.region.height == 0 {
            eyre::bail!("field '{name}': region width and height must be > 0");
        }

        // Domain
        if !finite_non_negative(self.domain.min) {
            eyre::bail!("field '{name}': domain.min must be a finite value >= 0");
        }
        if let Some(max) = self.domain.max
            && !(max.is_finite() && max > self.domain.min)
        {
            eyre::bail!("field '{name}': domain.max must be finite and > domain.min");
        }

        // Targets
        if self.targets.iter().any(|t| !finite_non_negative(*t)) {
            eyre::bail!("field '{name}': targets must be finite values >= 0");
        }

        // Format
        let dec = self.format.decimal_separator;
        if dec.is_ascii_digit() || dec.is_alphabetic() {
            eyre::bail!("field '{name}': format.decimal_separator must not be a digit or letter");
        }
        let mut thousands = self.format.thousands_separator.chars();
        match (thousands.next(), thousands.next()) {
            (None, _) => {}
            (Some(t), None) => {
                if t == dec {
                    eyre::bail!(
                        "field '{name}': format.thousands_separator must differ from decimal_separator"
                    );
                }
                if t.is_ascii_digit() || t.is_alphabetic() {
                    eyre::bail!(
                        "field '{name}': format.thousands_separator must not be a digit or letter"
                    );
                }
            }
            _ => eyre::bail!("field '{name}': format.thousands_separator must be a single character"),
        }
        for (suffix, mult) in &self.format.suffixes {
            if suffix.is_empty() || !suffix.chars().all(char::is_alphabetic) {
                eyre::bail!("field '{name}': suffix '{suffix}' must be non-empty letters");
            }
            if !(mult.is_finite() && *mult > 0.0) {
                eyre::bail!("field '{name}': suffix '{suffix}' multiplier must be > 0");
            }
        }

        // Validation thresholds
        let v = &self.validation;
        if !finite_non_negative(v.noise_abs) || !finite_non_negative(v.noise_rel) {
            eyre::bail!("field '{name}': validation.noise_abs/noise_rel must be >= 0");
        }
        if !(v.spike_factor.is_finite() && v.spike_factor >= 1.0) {
            eyre::bail!("field '{name}': validation.spike_factor must be >= 1.0");
        }
        if !finite_non_negative(v.spread_k) || !finite_non_negative(v.min_plausible_rate) {
            eyre::bail!("field '{name}': validation.spread_k/min_plausible_rate must be >= 0");
        }
        if !finite_non_negative(v.min_spike_step_rel) {
            eyre::bail!("field '{name}': validation.min_spike_step_rel must be >= 0");
        }
        if !(v.max_rate.is_finite() && v.max_rate > 0.0) {
            eyre::bail!("field '{name}': validation.max_rate must be > 0");
        }

        // Buffer
        if self.buffer.capacity < 2 {
            eyre::bail!("field '{name}': buffer.capacity must be >= 2");
        }
        if self.buffer.window_ms == Some(0) {
            eyre::bail!("field '{name}': buffer.window_ms must be >= 1 when set");
        }

        // Simulation
        if let Some(sim) = &self.simulate
            && (!finite_non_negative(sim.start) || !sim.rate_per_sec.is_finite())
        {
            eyre::bail!("field '{name}': simulate.start must be >= 0 and rate_per_sec finite");
        }

        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Session
        if self.session.interval_ms < 100 {
            eyre::bail!("session.interval_ms must be >= 100");
        }
        if self.session.collaborator_timeout_ms == 0 {
            eyre::bail!("session.collaborator_timeout_ms must be >= 1");
        }
        if self.session.failure_threshold == 0 {
            eyre::bail!("session.failure_threshold must be >= 1");
        }
        if self.session.control_poll_ms == 0 {
            eyre::bail!("session.control_poll_ms must be >= 1");
        }

        // Estimator
        if self.estimator.half_life_ms == 0 {
            eyre::bail!("estimator.half_life_ms must be >= 1");
        }
        if self.estimator.min_samples < 2 {
            eyre::bail!("estimator.min_samples must be >= 2");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Fields
        if self.fields.is_empty() {
            eyre::bail!("at least one [[field]] must be configured");
        }
        let mut seen = HashSet::new();
        for f in &self.fields {
            if !seen.insert(f.name.as_str()) {
                eyre::bail!("duplicate field name '{}'", f.name);
            }
            f.validate()?;
        }

        Ok(())
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldCfg> {
        self.fields.iter().find(|f| f.name == name)
    }
}
