//! Subcommand implementations.

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use eyre::WrapErr;
use serde_json::json;
use tapwatch_config::Config;
use tapwatch_core::conversions::{tracked_field, tracked_fields};
use tapwatch_core::{
    CollaboratorFailure, EstimatorCfg, FieldPipeline, RawReading, SessionCfg, SessionControl,
    SessionController, parse,
};

use crate::atomic::write_atomic;
use crate::backends;
use crate::cli::json_mode;
use crate::error_fmt::CliError;
use crate::render;

/// Minimum capture interval accepted from the command line.
const MIN_INTERVAL_MS: u64 = 100;

pub fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::Config(format!("cannot read {}: {e}", path.display())))?;
    let cfg = tapwatch_config::load_toml(&text).map_err(|e| CliError::Config(e.to_string()))?;
    cfg.validate().map_err(|e| CliError::Config(e.to_string()))?;
    Ok(cfg)
}

fn emit(text: impl FnOnce() -> String, json: impl FnOnce() -> String) {
    if json_mode() {
        println!("{}", json());
    } else {
        println!("{}", text());
    }
}

/// Read `pause`, `resume` and `stop` from stdin. End of input stops the
/// session.
fn spawn_stdin_commands(control: Arc<SessionControl>) {
    let spawned = std::thread::Builder::new()
        .name("tapwatch-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match line.trim() {
                    "pause" | "p" => control.request_pause(),
                    "resume" | "r" => control.request_resume(),
                    "stop" | "quit" | "q" => break,
                    "" => {}
                    other => eprintln!("unknown command '{other}' (pause|resume|stop)"),
                }
            }
            control.request_stop();
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "failed to start stdin command reader");
    }
}

pub fn run(
    cfg: &Config,
    cycles: Option<u64>,
    interval_ms: Option<u64>,
    interactive: bool,
) -> eyre::Result<()> {
    let fields = tracked_fields(cfg);
    let (capture, recognizer) = backends::build(cfg, &fields)?;
    let mut builder = SessionController::builder()
        .with_capture(capture)
        .with_recognizer(recognizer)
        .with_session(SessionCfg::from(&cfg.session))
        .with_estimator(EstimatorCfg::from(&cfg.estimator))
        .with_fields(fields);
    if let Some(ms) = interval_ms {
        if ms < MIN_INTERVAL_MS {
            return Err(CliError::Config(format!("--interval-ms must be >= {MIN_INTERVAL_MS}")).into());
        }
        builder = builder.with_interval(Duration::from_millis(ms));
    }
    let mut session = builder.build()?;

    // Start before wiring control sources: start() clears pending requests.
    session.start()?;
    let control = session.control();
    {
        let control = control.clone();
        if let Err(e) = ctrlc::set_handler(move || control.request_stop()) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }
    if interactive {
        spawn_stdin_commands(control);
    }

    let summary = tapwatch_core::run(&mut session, cycles, |report| {
        emit(|| render::cycle_text(report), || render::cycle_json(report));
    })?;

    let report = session.report();
    emit(
        || {
            let mut out = format!("summary: {} cycles ({:?})", summary.cycles, summary.end);
            for f in &report.fields {
                out.push('\n');
                out.push_str(&render::field_line(f));
                out.push_str(&format!(
                    "  accepted {} rejected {} resets {} parse failures {} capture/ocr failures {}",
                    f.stats.accepted,
                    f.stats.rejected,
                    f.stats.resets,
                    f.stats.parse_failures,
                    f.stats.collaborator_failures
                ));
            }
            out
        },
        || render::summary_json(&summary),
    );
    Ok(())
}

pub fn replay(cfg: &Config, csv: &Path) -> eyre::Result<()> {
    let rows = tapwatch_config::load_replay_csv(csv)?;
    let estimator = EstimatorCfg::from(&cfg.estimator);
    let mut pipelines: Vec<FieldPipeline> = tracked_fields(cfg)
        .into_iter()
        .map(|f| FieldPipeline::new(f, estimator.clone()))
        .collect();

    for (idx, row) in rows.iter().enumerate() {
        let pipeline = pipelines
            .iter_mut()
            .find(|p| p.name() == row.field)
            .ok_or_else(|| CliError::UnknownField(row.field.clone()))
            // header is line 1
            .wrap_err_with(|| format!("replay row {}", idx + 2))?;
        let outcome = pipeline.ingest(&RawReading {
            text: row.text.clone(),
            t_ms: row.t_ms,
        });
        let report = pipeline.report();
        emit(
            || {
                format!(
                    "{:>9} ms {:<24}{}",
                    row.t_ms,
                    render::ingest_name(&outcome),
                    render::field_line(&report)
                )
            },
            || {
                json!({
                    "type": "reading",
                    "t_ms": row.t_ms,
                    "text": row.text,
                    "outcome": render::ingest_name(&outcome),
                    "field": render::field_json(&report),
                })
                .to_string()
            },
        );
    }
    Ok(())
}

pub fn parse_text(cfg: &Config, field: &str, text: &str) -> eyre::Result<()> {
    let fc = cfg
        .field(field)
        .ok_or_else(|| CliError::UnknownField(field.to_string()))?;
    let tf = tracked_field(fc, &cfg.capture);
    let value = parse(text, &tf.format, &tf.domain)
        .map_err(eyre::Report::new)
        .wrap_err_with(|| format!("parse {text:?} as '{field}'"))?;
    emit(
        || render::fmt_value(value),
        || json!({ "type": "parse", "field": field, "text": text, "value": value }).to_string(),
    );
    Ok(())
}

pub fn self_check(cfg: &Config) -> eyre::Result<()> {
    let timeout = Duration::from_millis(cfg.session.collaborator_timeout_ms);
    let fields = tracked_fields(cfg);
    let (mut capture, mut recognizer) = backends::build(cfg, &fields)?;

    #[cfg(feature = "screen")]
    if cfg.capture.backend == tapwatch_config::Backend::Screen {
        let version = tapwatch_capture::TesseractCli::new(&cfg.capture.tesseract_path)
            .version(timeout)
            .wrap_err("tesseract self-check")?;
        emit(
            || format!("ok   tesseract: {version}"),
            || json!({ "type": "check", "engine": "tesseract", "ok": true, "version": version }).to_string(),
        );
    }

    let mut failed = 0usize;
    for f in &fields {
        let read = capture
            .capture(&f.region, timeout)
            .map_err(CollaboratorFailure::from)
            .and_then(|frame| {
                recognizer
                    .recognize(&frame, &f.ocr, timeout)
                    .map_err(CollaboratorFailure::from)
            });
        let (text, result) = match read {
            Ok(text) => {
                let parsed = parse(&text, &f.format, &f.domain).map_err(|e| e.name());
                (Some(text), parsed)
            }
            Err(e) => (None, Err(e.name())),
        };
        if result.is_err() {
            failed += 1;
        }
        emit(
            || match (&text, &result) {
                (Some(t), Ok(v)) => format!("ok   {}: {t:?} -> {}", f.name, render::fmt_value(*v)),
                (Some(t), Err(e)) => format!("FAIL {}: {t:?} ({e})", f.name),
                (None, Err(e)) => format!("FAIL {}: {e}", f.name),
                (None, Ok(_)) => format!("FAIL {}: no text", f.name),
            },
            || {
                json!({
                    "type": "check",
                    "field": f.name,
                    "ok": result.is_ok(),
                    "text": text,
                    "value": result.ok(),
                    "error": result.err(),
                })
                .to_string()
            },
        );
    }
    if failed > 0 {
        return Err(CliError::SelfCheck {
            failed,
            total: fields.len(),
        }
        .into());
    }
    emit(
        || format!("self-check ok ({} fields)", fields.len()),
        || json!({ "type": "check", "ok": true, "fields": fields.len() }).to_string(),
    );
    Ok(())
}

pub fn init(path: &Path, force: bool) -> eyre::Result<()> {
    if path.exists() && !force {
        return Err(CliError::ConfigExists(path.to_path_buf()).into());
    }
    write_atomic(path, tapwatch_config::DEFAULT_CONFIG.as_bytes())
        .wrap_err_with(|| format!("write {}", path.display()))?;
    emit(
        || format!("wrote {}", path.display()),
        || json!({ "type": "init", "path": path.display().to_string() }).to_string(),
    );
    Ok(())
}
