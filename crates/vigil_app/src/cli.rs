//! Command-line interface.

use clap::{Args, Parser, Subcommand};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing::Level;

use crate::config::{
    DEFAULT_FAILURE_LOG, DEFAULT_FILL_PERCENT, DEFAULT_SUCCESS_LOG, FillOptions, VerifyOptions,
};

#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, env = "VIGIL_LOG_LEVEL", default_value = "info")]
    pub log_level: Level,

    /// Output logs as JSON
    #[arg(long, global = true, env = "VIGIL_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read every block of a device and record the outcome of each
    Verify(VerifyArgs),
    /// Fill a mounted filesystem with a repeating pattern
    Fill(FillArgs),
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Block device or disk image to verify
    pub device: PathBuf,

    /// Block-size multiplier applied to the native sector size (power of two)
    #[arg(long, env = "VIGIL_SCALE")]
    pub scale: Option<u32>,

    /// Concurrent readers; defaults to the number of CPUs
    #[arg(short, long, env = "VIGIL_WORKERS")]
    pub workers: Option<NonZeroUsize>,

    /// Sector size of a disk image (required for regular files)
    #[arg(long, env = "VIGIL_SECTOR_SIZE")]
    pub sector_size: Option<u32>,

    /// Ledger of successfully read blocks
    #[arg(long, env = "VIGIL_SUCCESS_LOG", default_value = DEFAULT_SUCCESS_LOG)]
    pub success_log: PathBuf,

    /// Ledger of failed blocks
    #[arg(long, env = "VIGIL_FAILURE_LOG", default_value = DEFAULT_FAILURE_LOG)]
    pub failure_log: PathBuf,

    /// Write a JSON report of the run
    #[arg(long, env = "VIGIL_REPORT")]
    pub report: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long, env = "VIGIL_NO_PROGRESS")]
    pub no_progress: bool,
}

#[derive(Args, Debug)]
pub struct FillArgs {
    /// Mount point of the filesystem to fill
    pub mount: PathBuf,

    /// Output file; defaults to <MOUNT>/FillData
    #[arg(long, env = "VIGIL_FILL_FILE")]
    pub file: Option<PathBuf>,

    /// Target share of the filesystem in use
    #[arg(
        long,
        env = "VIGIL_FILL_PERCENT",
        default_value_t = DEFAULT_FILL_PERCENT,
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    pub percent: u8,

    /// Disable the progress bar
    #[arg(long, env = "VIGIL_NO_PROGRESS")]
    pub no_progress: bool,
}

impl From<VerifyArgs> for VerifyOptions {
    fn from(args: VerifyArgs) -> Self {
        let mut options =
            VerifyOptions::new(args.device).with_logs(args.success_log, args.failure_log);

        if let Some(scale) = args.scale {
            options = options.with_scale(scale);
        }
        if let Some(workers) = args.workers {
            options = options.with_workers(workers.get());
        }
        if let Some(sector_size) = args.sector_size {
            options = options.with_sector_size(sector_size);
        }
        if let Some(report) = args.report {
            options = options.with_report(report);
        }
        if args.no_progress {
            options = options.without_progress();
        }
        options
    }
}

impl From<FillArgs> for FillOptions {
    fn from(args: FillArgs) -> Self {
        let mut options = FillOptions::new(args.mount).with_percent(args.percent);

        if let Some(file) = args.file {
            options = options.with_file(file);
        }
        if args.no_progress {
            options = options.without_progress();
        }
        options
    }
}
