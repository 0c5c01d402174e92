#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
mod atomic;
mod backends;
mod cli;
mod commands;
mod error_fmt;
mod logging;
mod render;

use std::process::ExitCode;

use clap::Parser;

use crate::cli::{Cli, Commands, JSON_MODE, json_mode};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("warning: failed to install error report handler: {e}");
    }

    match dispatch(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            if json_mode() {
                println!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
            }
            ExitCode::from(exit_code_for_error(&err))
        }
    }
}

fn dispatch(cli: &Cli) -> eyre::Result<()> {
    if let Commands::Init { force } = &cli.cmd {
        logging::init(cli.json, &cli.log_level, None)?;
        return commands::init(&cli.config, *force);
    }

    let cfg = commands::load_config(&cli.config)?;
    logging::init(cli.json, &cli.log_level, Some(&cfg.logging))?;
    tracing::debug!(config = %cli.config.display(), fields = cfg.fields.len(), "config loaded");

    match &cli.cmd {
        Commands::Run {
            cycles,
            interval_ms,
            interactive,
        } => commands::run(&cfg, *cycles, *interval_ms, *interactive),
        Commands::Replay { csv } => commands::replay(&cfg, csv),
        Commands::Parse { field, text } => commands::parse_text(&cfg, field, text),
        Commands::SelfCheck => commands::self_check(&cfg),
        Commands::Init { .. } => Ok(()),
    }
}
