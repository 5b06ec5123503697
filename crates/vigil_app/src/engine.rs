use anyhow::Context;
use chrono::Utc;
use humansize::{BINARY, format_size};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::info;
use vigil_core::{BlockPlan, OutcomeLedger, ScanOrchestrator, ScanSummary, WorkerPool};
use vigil_io::{DeviceHandle, IoMode, probe};

use crate::config::VerifyOptions;
use crate::progress::ProgressReporter;
use crate::report::ScanReport;

pub type EngineResult<T> = anyhow::Result<T>;

/// Verifies every block of `options.device`.
///
/// Geometry, plan and alignment problems abort before the first read. Block
/// failures do not; they are in the returned summary and the failure ledger.
pub fn run_verify(options: &VerifyOptions, running: Arc<AtomicBool>) -> EngineResult<ScanSummary> {
    let started_at = Utc::now();
    let device = options.device.as_path();

    let probe = probe(device, options.sector_size)
        .with_context(|| format!("Failed to establish geometry of {}", device.display()))?;
    let plan = BlockPlan::new(probe.geometry, options.scale).context("Invalid block size")?;

    let handle = DeviceHandle::open(device, &probe.geometry)
        .with_context(|| format!("Failed to open device: {}", device.display()))?;
    let io_mode = handle.mode();

    info!(
        device = %device.display(),
        size = %format_size(probe.geometry.total_bytes(), BINARY),
        block_size = %format_size(plan.effective_block_size(), BINARY),
        blocks = plan.total_blocks(),
        workers = options.workers,
        %io_mode,
        "starting verification"
    );

    // Ledger files are truncated only once nothing fatal can happen before
    // the first read.
    let pool = WorkerPool::new(handle, plan, options.workers)
        .context("Failed to prepare worker pool")?;
    let ledger = OutcomeLedger::create(&options.success_log, &options.failure_log)
        .context("Failed to create ledger files")?;

    let reporter = if options.progress {
        Some(ProgressReporter::for_scan(plan.total_blocks())?)
    } else {
        None
    };

    let mut orchestrator = ScanOrchestrator::new(&pool, &ledger).with_cancellation(running);
    if let Some(reporter) = &reporter {
        orchestrator = orchestrator.with_progress(reporter.scan_callback());
    }

    let summary = orchestrator.run().context("Verification aborted")?;
    drop(orchestrator);

    if let Some(reporter) = &reporter {
        if summary.cancelled {
            reporter.abandon("Interrupted");
        } else {
            reporter.finish("Done");
        }
    }

    ledger.finish().context("Failed to flush ledger files")?;
    let finished_at = Utc::now();

    print_summary(options, &plan, io_mode, &summary);

    if let Some(path) = &options.report {
        ScanReport::new(
            device,
            probe.source,
            io_mode,
            plan,
            options.workers,
            (options.success_log.as_path(), options.failure_log.as_path()),
            summary,
            (started_at, finished_at),
        )
        .write_to(path)?;
        info!(path = %path.display(), "report written");
    }

    Ok(summary)
}

fn print_summary(options: &VerifyOptions, plan: &BlockPlan, io_mode: IoMode, summary: &ScanSummary) {
    let verified_bytes = summary.processed * u64::from(plan.effective_block_size());
    let seconds = summary.elapsed.as_secs_f64();
    let throughput = if seconds > 0.0 {
        format!("{}/s", format_size((verified_bytes as f64 / seconds) as u64, BINARY))
    } else {
        "-".to_string()
    };

    println!("\n╔════════════════════════════════════════╗");
    if summary.cancelled {
        println!("║    === Verification Interrupted ===    ║");
    } else {
        println!("║     === Verification Finished ===      ║");
    }
    println!("╠════════════════════════════════════════╣");
    println!("║ I/O Mode:           {:>18} ║", io_mode);
    println!(
        "║ Block Size:         {:>18} ║",
        format_size(plan.effective_block_size(), BINARY)
    );
    println!("║ Blocks Planned:     {:>18} ║", summary.total);
    println!("║ Blocks Processed:   {:>18} ║", summary.processed);
    println!("║ Succeeded:          {:>18} ║", summary.succeeded);
    println!("║ Failed:             {:>18} ║", summary.failed);
    println!("║   Short Reads:      {:>18} ║", summary.short_reads);
    println!("║   Read Errors:      {:>18} ║", summary.read_errors);
    println!("║ Elapsed Time:       {:>18} ║", format!("{seconds:.1}s"));
    println!("║ Throughput:         {:>18} ║", throughput);
    println!("╠════════════════════════════════════════╣");
    println!("║ Success log: {}", options.success_log.display());
    println!("║ Failure log: {}", options.failure_log.display());
    println!("╚════════════════════════════════════════╝");
}
