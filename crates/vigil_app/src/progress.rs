//! Progress reporting for the CLI

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use vigil_core::{ProgressCallback, ScanProgress};

/// Progress reporter using indicatif
pub struct ProgressReporter {
    bar: Arc<ProgressBar>,
}

impl ProgressReporter {
    fn new(total: u64, template: &str, message: &str) -> Result<Self> {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(template)?
                .progress_chars("#>-"),
        );
        bar.set_message(message.to_string());

        Ok(Self { bar: Arc::new(bar) })
    }

    /// Creates a progress reporter counting verified blocks
    pub fn for_scan(total_blocks: u64) -> Result<Self> {
        Self::new(
            total_blocks,
            "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} blocks ({eta})",
            "Verifying blocks...",
        )
    }

    /// Creates a progress reporter counting written bytes
    pub fn for_fill(total_bytes: u64) -> Result<Self> {
        Self::new(
            total_bytes,
            "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            "Filling partition...",
        )
    }

    pub fn update(&self, position: u64) {
        self.bar.set_position(position);
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Leaves the bar where it stopped
    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }

    /// Gets a callback for scan progress
    pub fn scan_callback(&self) -> ProgressCallback {
        let bar = Arc::clone(&self.bar);
        Box::new(move |progress: &ScanProgress| {
            bar.set_position(progress.processed);
            bar.set_message(format!(
                "Wave {} | {} ok | {} failed",
                progress.wave + 1,
                progress.succeeded,
                progress.failed
            ));
        })
    }
}
