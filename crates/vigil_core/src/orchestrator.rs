//! Wave-synchronous driver of a scan.
//!
//! At most `workers` reads are in flight at any time, and wave `k + 1` is not
//! dispatched before every outcome of wave `k` is in the ledger and flushed
//! to its stream.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

use crate::error::Result;
use crate::ledger::OutcomeLedger;
use crate::pool::WorkerPool;
use crate::traits::BlockSource;
use crate::types::{ScanProgress, ScanSummary};

/// Progress observer, invoked after each completed wave.
pub type ProgressCallback = Box<dyn Fn(&ScanProgress) + Send + Sync>;

pub struct ScanOrchestrator<'a, S, W, F> {
    pool: &'a WorkerPool<S>,
    ledger: &'a OutcomeLedger<W, F>,
    running: Option<Arc<AtomicBool>>,
    progress: Option<ProgressCallback>,
}

impl<'a, S, W, F> ScanOrchestrator<'a, S, W, F>
where
    S: BlockSource,
    W: Write + Send,
    F: Write + Send,
{
    pub fn new(pool: &'a WorkerPool<S>, ledger: &'a OutcomeLedger<W, F>) -> Self {
        Self {
            pool,
            ledger,
            running: None,
            progress: None,
        }
    }

    /// Stops the scan before the next wave once `running` turns false.
    /// A wave already dispatched always runs to completion.
    pub fn with_cancellation(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Scans every block of the pool's plan.
    ///
    /// Per-block failures are recorded in the ledger and counted in the
    /// summary; only ledger I/O failures abort the run.
    pub fn run(&self) -> Result<ScanSummary> {
        let plan = self.pool.plan();
        let total = plan.total_blocks();
        let workers = self.pool.workers();

        let span = info_span!(
            "scan",
            total_blocks = total,
            block_size = plan.effective_block_size(),
            workers
        );
        let _guard = span.enter();

        if total == 0 {
            warn!(
                total_bytes = plan.geometry().total_bytes(),
                block_size = plan.effective_block_size(),
                "device is smaller than one scan block, nothing to verify"
            );
        }

        let start = Instant::now();
        let ledger = self.ledger;
        let mut cancelled = false;

        for (wave, blocks) in plan.waves(workers).enumerate() {
            if !self.keep_running() {
                warn!(next_block = blocks.start, "scan cancelled");
                cancelled = true;
                break;
            }

            debug!(wave, first = blocks.start, last = blocks.end - 1, "dispatching wave");

            self.pool.dispatch(blocks, |index, outcome| {
                if !outcome.is_success() {
                    warn!(block = index, %outcome, "block verification failed");
                }
                ledger.record(index, &outcome)
            })?;

            // A wave's lines reach the files before the next wave starts.
            ledger.flush()?;

            if let Some(callback) = &self.progress {
                callback(&ScanProgress {
                    wave: wave as u64,
                    processed: ledger.recorded(),
                    total,
                    succeeded: ledger.succeeded(),
                    failed: ledger.failed(),
                });
            }
        }

        ledger.flush()?;

        let summary = ScanSummary {
            total,
            processed: ledger.recorded(),
            succeeded: ledger.succeeded(),
            failed: ledger.failed(),
            short_reads: ledger.short_reads(),
            read_errors: ledger.read_errors(),
            cancelled,
            elapsed: start.elapsed(),
        };

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "scan finished"
        );

        Ok(summary)
    }

    fn keep_running(&self) -> bool {
        self.running
            .as_ref()
            .is_none_or(|running| running.load(Ordering::SeqCst))
    }
}
