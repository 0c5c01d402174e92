//! Text and JSON-lines rendering of reports.

use serde_json::{Value, json};
use tapwatch_core::{CycleReport, FieldReport, Ingest, Projection, RunEnd, RunSummary};

pub fn fmt_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}

/// One line per field: value, rate, projections and last error.
pub fn field_line(f: &FieldReport) -> String {
    let value = f.current_value.map_or_else(|| "-".to_string(), fmt_value);
    let rate = match &f.rate {
        Some(r) if r.low_confidence => format!("{:+.2}/s (low confidence)", r.per_sec),
        Some(r) => format!("{:+.2}/s ({:+.1}/min)", r.per_sec, r.per_minute()),
        None => "rate n/a".to_string(),
    };
    let mut line = format!("  {:<12} {:>14}  {rate}", f.name, value);
    for p in &f.projections {
        line.push_str(&format!("  {}: {}", fmt_value(p.target), p.projection.describe()));
    }
    if let Some(err) = &f.last_error {
        line.push_str(&format!("  [{}]", err.name()));
    }
    line
}

/// Short name of what happened to a reading.
pub fn ingest_name(outcome: &Ingest) -> String {
    match outcome {
        Ingest::Accepted(_) => "accepted".to_string(),
        Ingest::Reset(_) => "reset".to_string(),
        Ingest::Rebaselined(_) => "rebaselined".to_string(),
        Ingest::Rejected(r) => format!("rejected:{}", r.name()),
        Ingest::Unparsable(p) => format!("unparsable:{}", p.name()),
    }
}

pub fn cycle_text(r: &CycleReport) -> String {
    let mut out = format!(
        "cycle {} @ {:.1}s [{}]",
        r.cycle,
        r.at_ms as f64 / 1000.0,
        r.state.name()
    );
    if r.failed_cycles > 0 {
        out.push_str(&format!(" failed cycles: {}", r.failed_cycles));
    }
    for f in &r.fields {
        out.push('\n');
        out.push_str(&field_line(f));
    }
    out
}

fn projection_json(p: &Projection) -> (&'static str, Value) {
    match p {
        Projection::Eta { seconds } => ("eta", json!(seconds)),
        Projection::Infeasible => ("infeasible", Value::Null),
        Projection::Unavailable => ("unavailable", Value::Null),
    }
}

pub fn field_json(f: &FieldReport) -> Value {
    let projections: Vec<Value> = f
        .projections
        .iter()
        .map(|p| {
            let (status, eta) = projection_json(&p.projection);
            json!({ "target": p.target, "status": status, "eta_s": eta })
        })
        .collect();
    json!({
        "name": f.name,
        "current_value": f.current_value,
        "rate_per_sec": f.rate.as_ref().map(|r| r.per_sec),
        "rate_per_min": f.rate.as_ref().map(|r| r.per_minute()),
        "low_confidence": f.rate.as_ref().map(|r| r.low_confidence),
        "projections": projections,
        "last_error": f.last_error.as_ref().map(|e| e.name()),
        "run_len": f.run_len,
        "stats": {
            "accepted": f.stats.accepted,
            "rejected": f.stats.rejected,
            "resets": f.stats.resets,
            "rebaselines": f.stats.rebaselines,
            "parse_failures": f.stats.parse_failures,
            "collaborator_failures": f.stats.collaborator_failures,
            "consecutive_failures": f.stats.consecutive_failures,
        },
    })
}

pub fn cycle_json(r: &CycleReport) -> String {
    let fields: Vec<Value> = r.fields.iter().map(field_json).collect();
    json!({
        "type": "cycle",
        "cycle": r.cycle,
        "at_ms": r.at_ms,
        "state": r.state.name(),
        "failed_cycles": r.failed_cycles,
        "fields": fields,
    })
    .to_string()
}

pub fn summary_json(s: &RunSummary) -> String {
    let end = match s.end {
        RunEnd::Stopped => "stopped",
        RunEnd::CycleLimit => "cycle-limit",
    };
    json!({ "type": "summary", "cycles": s.cycles, "end": end }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapwatch_core::{FieldStats, TargetProjection};

    fn report() -> FieldReport {
        FieldReport {
            name: "gold".into(),
            current_value: Some(129.0),
            rate: None,
            projections: vec![
                TargetProjection {
                    target: 200.0,
                    projection: Projection::Unavailable,
                },
                TargetProjection {
                    target: 50.0,
                    projection: Projection::Infeasible,
                },
            ],
            last_error: None,
            run_len: 4,
            stats: FieldStats::default(),
        }
    }

    #[test]
    fn text_line_names_every_target() {
        let line = field_line(&report());
        assert!(line.contains("gold"));
        assert!(line.contains("129"));
        assert!(line.contains("rate n/a"));
        assert!(line.contains("200: n/a"));
        assert!(line.contains("50: reached"));
    }

    #[test]
    fn json_uses_null_for_missing_rate() {
        let v = field_json(&report());
        assert!(v["rate_per_sec"].is_null());
        assert_eq!(v["projections"][1]["status"], "infeasible");
        assert_eq!(v["current_value"], 129.0);
    }
}
