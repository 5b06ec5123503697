//! JSON report of a verification run.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use vigil_core::{BlockPlan, Geometry, ScanSummary};
use vigil_io::{GeometrySource, IoMode};

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub device: PathBuf,
    pub geometry_source: String,
    pub io_mode: String,
    pub geometry: Geometry,
    pub plan: BlockPlan,
    pub workers: usize,
    pub success_log: PathBuf,
    pub failure_log: PathBuf,
    pub summary: ScanSummary,
    pub started_at: String,
    pub finished_at: String,
}

impl ScanReport {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &Path,
        source: GeometrySource,
        io_mode: IoMode,
        plan: BlockPlan,
        workers: usize,
        logs: (&Path, &Path),
        summary: ScanSummary,
        window: (DateTime<Utc>, DateTime<Utc>),
    ) -> Self {
        Self {
            device: device.to_path_buf(),
            geometry_source: source.to_string(),
            io_mode: io_mode.to_string(),
            geometry: plan.geometry(),
            plan,
            workers,
            success_log: logs.0.to_path_buf(),
            failure_log: logs.1.to_path_buf(),
            summary,
            started_at: window.0.to_rfc3339_opts(SecondsFormat::Millis, true),
            finished_at: window.1.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize scan report")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write scan report to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_report_serializes_run() {
        let geometry = Geometry::new(1_048_576, 512).unwrap();
        let plan = BlockPlan::new(geometry, None).unwrap();
        let summary = ScanSummary {
            total: 8,
            processed: 8,
            succeeded: 7,
            failed: 1,
            short_reads: 1,
            read_errors: 0,
            cancelled: false,
            elapsed: Duration::from_millis(12),
        };
        let started = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);

        let report = ScanReport::new(
            Path::new("/dev/sdb"),
            GeometrySource::BlockDeviceIoctl,
            IoMode::Direct,
            plan,
            4,
            (Path::new("/tmp/success"), Path::new("/tmp/failed")),
            summary,
            (started, started + chrono::Duration::seconds(1)),
        );

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["device"], "/dev/sdb");
        assert_eq!(value["io_mode"], "direct");
        assert_eq!(value["geometry_source"], "block device ioctl");
        assert_eq!(value["plan"]["effective_block_size"], 131_072);
        assert_eq!(value["plan"]["total_blocks"], 8);
        assert_eq!(value["summary"]["short_reads"], 1);
        assert_eq!(value["started_at"], "2026-01-02T03:04:05.000Z");
        assert_eq!(value["finished_at"], "2026-01-02T03:04:06.000Z");
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let geometry = Geometry::new(4096, 512).unwrap();
        let plan = BlockPlan::new(geometry, Some(1)).unwrap();
        let summary = ScanSummary {
            total: 8,
            processed: 8,
            succeeded: 8,
            failed: 0,
            short_reads: 0,
            read_errors: 0,
            cancelled: false,
            elapsed: Duration::ZERO,
        };
        let now = Utc::now();
        let report = ScanReport::new(
            Path::new("disk.img"),
            GeometrySource::ImageFile,
            IoMode::Buffered,
            plan,
            1,
            (Path::new("s"), Path::new("f")),
            summary,
            (now, now),
        );

        assert!(report.write_to(&dir.path().join("no/such/report.json")).is_err());
        let target = dir.path().join("report.json");
        report.write_to(&target).unwrap();
        assert!(fs::read_to_string(target).unwrap().contains("\"total_blocks\": 8"));
    }
}
