//! Vigil - Block Device Read Verifier
//!
//! Reads every block of a disk concurrently and records, per block, whether
//! it could be read back in full.

mod cli;
mod config;
mod engine;
mod fill;
mod progress;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, error, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{Cli, Command};
use config::{FillOptions, VerifyOptions};

/// Block failures, a cancelled scan or an unreached fill target.
const EXIT_INCOMPLETE: u8 = 2;
const EXIT_FATAL: u8 = 1;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_json);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    match cli.command {
        Command::Verify(args) => {
            let options = VerifyOptions::from(args);
            let summary = engine::run_verify(&options, running)?;

            if summary.is_clean() {
                Ok(ExitCode::SUCCESS)
            } else {
                if summary.failed > 0 {
                    warn!(
                        failed = summary.failed,
                        log = %options.failure_log.display(),
                        "blocks failed verification"
                    );
                }
                Ok(ExitCode::from(EXIT_INCOMPLETE))
            }
        }
        Command::Fill(args) => {
            let options = FillOptions::from(args);
            let summary = fill::fill_partition(&options, running)?;

            if summary.reached_target() && !summary.cancelled {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_INCOMPLETE))
            }
        }
    }
}

/// Logs go to stderr; stdout carries only the run summary.
fn init_logging(level: Level, json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
