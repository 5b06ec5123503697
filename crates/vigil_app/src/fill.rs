//! Partition filler.
//!
//! Grows a single file with a repeating text pattern until the filesystem's
//! used space reaches the requested share of its capacity, so that a later
//! verification pass exercises written cells rather than erased ones.

use anyhow::{Context, Result};
use humansize::{BINARY, format_size};
use std::fs::File;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use vigil_io::{FilesystemCapacity, filesystem_capacity};

use crate::config::FillOptions;
use crate::progress::ProgressReporter;

pub const FILL_PATTERN: &[u8] = b"Lorem ipsum dolor sit amet, consectetur adipiscing elit.";

/// Pattern repetitions per write call, about 900 KiB.
const CHUNK_REPEATS: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillSummary {
    pub total_bytes: u64,
    pub target_used: u64,
    pub used_before: u64,
    pub used_after: u64,
    pub written: u64,
    pub filesystem_full: bool,
    pub cancelled: bool,
}

impl FillSummary {
    #[inline]
    pub fn reached_target(&self) -> bool {
        self.used_after >= self.target_used
    }
}

/// Used bytes at which the filesystem counts as `percent` full.
pub fn target_used_bytes(capacity: &FilesystemCapacity, percent: u8) -> u64 {
    let percent = u128::from(percent.min(100));
    (u128::from(capacity.total_bytes) * percent / 100) as u64
}

pub fn bytes_to_write(capacity: &FilesystemCapacity, percent: u8) -> u64 {
    target_used_bytes(capacity, percent).saturating_sub(capacity.used_bytes())
}

/// Writes `amount` bytes of the repeating pattern, stopping early once
/// `running` turns false. Returns the number of bytes handed to `writer`.
pub fn write_pattern<W: Write>(
    writer: &mut W,
    amount: u64,
    running: &AtomicBool,
    mut on_progress: impl FnMut(u64),
) -> io::Result<u64> {
    let chunk = FILL_PATTERN.repeat(CHUNK_REPEATS);
    let mut written = 0u64;

    while written < amount && running.load(Ordering::SeqCst) {
        let len = (amount - written).min(chunk.len() as u64) as usize;
        writer.write_all(&chunk[..len])?;
        written += len as u64;
        on_progress(written);
    }

    Ok(written)
}

pub fn fill_partition(options: &FillOptions, running: Arc<AtomicBool>) -> Result<FillSummary> {
    let mut file = File::create(&options.file)
        .with_context(|| format!("Failed to create fill file {}", options.file.display()))?;

    let before = filesystem_capacity(&options.mount).with_context(|| {
        format!("Failed to get filesystem statistics for {}", options.mount.display())
    })?;
    let target_used = target_used_bytes(&before, options.percent);
    let amount = bytes_to_write(&before, options.percent);

    info!(
        mount = %options.mount.display(),
        total = %format_size(before.total_bytes, BINARY),
        used = %format_size(before.used_bytes(), BINARY),
        target = %format_size(target_used, BINARY),
        to_write = %format_size(amount, BINARY),
        "filling partition"
    );

    let reporter = if options.progress && amount > 0 {
        Some(ProgressReporter::for_fill(amount)?)
    } else {
        None
    };

    let mut filesystem_full = false;
    let outcome = write_pattern(&mut file, amount, &running, |written| {
        if let Some(reporter) = &reporter {
            reporter.update(written);
        }
    });
    match outcome {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::StorageFull => {
            warn!("filesystem full before reaching the target");
            filesystem_full = true;
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("Write to {} failed", options.file.display()));
        }
    }

    if let Err(err) = file.sync_all() {
        warn!(error = %err, "failed to sync fill file");
    }
    let written = file
        .metadata()
        .with_context(|| format!("Failed to stat {}", options.file.display()))?
        .len();

    let after = filesystem_capacity(&options.mount).with_context(|| {
        format!("Failed to get filesystem statistics for {}", options.mount.display())
    })?;

    let summary = FillSummary {
        total_bytes: before.total_bytes,
        target_used,
        used_before: before.used_bytes(),
        used_after: after.used_bytes(),
        written,
        filesystem_full,
        cancelled: !running.load(Ordering::SeqCst),
    };

    if let Some(reporter) = &reporter {
        if summary.cancelled {
            reporter.abandon("Interrupted");
        } else {
            reporter.finish("Done");
        }
    }

    print_summary(options, &summary);
    Ok(summary)
}

fn print_summary(options: &FillOptions, summary: &FillSummary) {
    println!("\n╔════════════════════════════════════════╗");
    if summary.reached_target() {
        println!("║         === Fill Complete ===          ║");
    } else {
        println!("║       === Fill Incomplete ===          ║");
    }
    println!("╠════════════════════════════════════════╣");
    println!(
        "║ Filesystem Size:    {:>18} ║",
        format_size(summary.total_bytes, BINARY)
    );
    println!(
        "║ Target ({:>3}%):     {:>18} ║",
        options.percent,
        format_size(summary.target_used, BINARY)
    );
    println!(
        "║ Used Before:        {:>18} ║",
        format_size(summary.used_before, BINARY)
    );
    println!(
        "║ Used After:         {:>18} ║",
        format_size(summary.used_after, BINARY)
    );
    println!(
        "║ Written:            {:>18} ║",
        format_size(summary.written, BINARY)
    );
    println!("╠════════════════════════════════════════╣");
    println!("║ Fill file: {}", options.file.display());
    println!("╚════════════════════════════════════════╝");
}
