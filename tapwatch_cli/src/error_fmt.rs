//! Human-readable error descriptions and structured JSON error formatting.

use std::path::PathBuf;

use tapwatch_core::error::{BuildError, ParseFailure, SessionError};

/// Failures that originate in the CLI itself.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("no field named '{0}' in the configuration")]
    UnknownField(String),
    #[error("{failed} of {total} fields failed the self-check")]
    SelfCheck { failed: usize, total: usize },
    #[error("{} already exists", .0.display())]
    ConfigExists(PathBuf),
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(ce) = err.downcast_ref::<CliError>() {
        return match ce {
            CliError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, or run `tapwatch init` for a commented starter file."
            ),
            CliError::UnknownField(name) => format!(
                "What happened: No field named '{name}' is configured.\nLikely causes: A typo, or the recording was made with another config.\nHow to fix: Use one of the [[field]] names from the config file."
            ),
            CliError::SelfCheck { failed, total } => format!(
                "What happened: {failed} of {total} fields could not be read.\nLikely causes: The game window is closed, a region points off-screen, or the OCR engine is missing.\nHow to fix: Check the lines marked FAIL above, fix [capture] or the field's region, and rerun."
            ),
            CliError::ConfigExists(path) => format!(
                "What happened: {} already exists.\nLikely causes: `tapwatch init` was run before.\nHow to fix: Pass --force to overwrite it, or choose another --config path.",
                path.display()
            ),
        };
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingCapture => {
                "What happened: No capture backend was provided to the session.\nLikely causes: The backend failed to initialize or was not wired into the builder.\nHow to fix: Check [capture].backend and pass the backend via with_capture(...).".to_string()
            }
            BuildError::MissingRecognizer => {
                "What happened: No OCR engine was provided to the session.\nLikely causes: The engine failed to initialize or was not wired into the builder.\nHow to fix: Check [capture] and pass the engine via with_recognizer(...).".to_string()
            }
            BuildError::NoFields => {
                "What happened: No fields to track.\nLikely causes: The config has no [[field]] entries.\nHow to fix: Add at least one [[field]] with a name and region.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<SessionError>() {
        return match se {
            SessionError::CollaboratorFailures { cycles } => format!(
                "What happened: Capture or OCR failed for every field in {cycles} consecutive cycles.\nLikely causes: The game window is closed or minimized, regions point off-screen, or the OCR engine is not installed.\nHow to fix: Run `tapwatch self-check`, fix [capture] or the field regions, then start again."
            ),
            SessionError::NoCapturableFields => {
                "What happened: No field has a usable capture region.\nLikely causes: Every region has zero width or height.\nHow to fix: Give each [[field]] a region with width and height > 0.".to_string()
            }
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(pf) = err.downcast_ref::<ParseFailure>() {
        return format!(
            "What happened: The text could not be read as a number ({}).\nLikely causes: OCR noise, a suffix or separator the field does not expect, or a value outside the field's domain.\nHow to fix: Adjust the field's format and domain settings, or check the capture region.",
            pf.name()
        );
    }

    // String-based heuristics for errors coming from loaders and backends
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("replay csv must have headers") {
        return "Invalid headers in replay CSV. Expected 't_ms,field,text'.".to_string();
    }

    if lower.contains("tesseract") && lower.contains("failed to start") {
        return "What happened: The tesseract OCR engine could not be started.\nLikely causes: Tesseract is not installed or not on PATH.\nHow to fix: Install tesseract or set [capture].tesseract_path.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: collaborator failure threshold 3, invalid
/// configuration 2, anything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> u8 {
    if let Some(SessionError::CollaboratorFailures { .. }) = err.downcast_ref::<SessionError>() {
        return 3;
    }
    if matches!(
        err.downcast_ref::<CliError>(),
        Some(CliError::Config(_) | CliError::ConfigExists(_))
    ) || matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_) | BuildError::NoFields)
    ) {
        return 2;
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(se) = err.downcast_ref::<SessionError>() {
        return match se {
            SessionError::CollaboratorFailures { .. } => "CollaboratorFailures",
            SessionError::NoCapturableFields => "NoCapturableFields",
            SessionError::InvalidTransition { .. } => "InvalidTransition",
            SessionError::UnknownField(_) => "UnknownField",
        };
    }
    if let Some(ce) = err.downcast_ref::<CliError>() {
        return match ce {
            CliError::Config(_) => "InvalidConfig",
            CliError::UnknownField(_) => "UnknownField",
            CliError::SelfCheck { .. } => "SelfCheck",
            CliError::ConfigExists(_) => "ConfigExists",
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidConfig";
    }
    if err.downcast_ref::<ParseFailure>().is_some() {
        return "ParseFailure";
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let details = match err.downcast_ref::<SessionError>() {
        Some(SessionError::CollaboratorFailures { cycles }) => Some(json!({ "cycles": cycles })),
        _ => match err.downcast_ref::<ParseFailure>() {
            Some(pf) => Some(json!({ "failure": pf.name() })),
            None => None,
        },
    };
    let msg = humanize(err);
    let obj = match details {
        Some(d) => json!({ "type": "error", "reason": reason_name(err), "details": d, "message": msg }),
        None => json!({ "type": "error", "reason": reason_name(err), "message": msg }),
    };
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_maps_to_exit_code_three() {
        let err = eyre::Report::new(SessionError::CollaboratorFailures { cycles: 5 });
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("5 consecutive cycles"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).expect("json");
        assert_eq!(v["reason"], "CollaboratorFailures");
        assert_eq!(v["details"]["cycles"], 5);
    }

    #[test]
    fn config_errors_map_to_exit_code_two() {
        let err = eyre::Report::new(CliError::Config("session.interval_ms must be >= 100".into()));
        assert_eq!(exit_code_for_error(&err), 2);
        assert!(humanize(&err).starts_with("What happened: Invalid configuration"));
    }

    #[test]
    fn context_does_not_hide_typed_errors() {
        use eyre::WrapErr;
        let err: eyre::Result<()> = Err(eyre::Report::new(ParseFailure::NonNumeric));
        let err = err.wrap_err("parse 'abc'").expect_err("error");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).contains("non-numeric"));
    }
}
