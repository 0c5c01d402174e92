//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(
    name = "tapwatch",
    version,
    about = "Track on-screen game counters and project time to targets"
)]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "tapwatch.toml")]
    pub config: PathBuf,

    /// Emit reports and errors as JSON lines, and log as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG overrides
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sample every configured field until stopped
    Run {
        /// Stop after this many completed cycles
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
        /// Override [session].interval_ms (>= 100)
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,
        /// Read `pause`, `resume` and `stop` commands from stdin
        #[arg(long, action = ArgAction::SetTrue)]
        interactive: bool,
    },
    /// Feed recorded OCR text (CSV: t_ms,field,text) through the pipeline
    Replay {
        #[arg(long, value_name = "FILE")]
        csv: PathBuf,
    },
    /// Parse one piece of text with a field's format settings
    Parse {
        #[arg(long, value_name = "NAME")]
        field: String,
        /// Text as the OCR engine would return it
        text: String,
    },
    /// Validate the config and read each field once
    SelfCheck,
    /// Write a commented starter config to --config
    Init {
        /// Overwrite an existing file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
}
