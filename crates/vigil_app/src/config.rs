//! Run options consumed by the verify and fill commands.

use std::path::PathBuf;

pub const DEFAULT_SUCCESS_LOG: &str = "/tmp/success";
pub const DEFAULT_FAILURE_LOG: &str = "/tmp/failed";
pub const DEFAULT_FILL_PERCENT: u8 = 90;
pub const FILL_FILE_NAME: &str = "FillData";

/// Options for verifying a device
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Block device or image file to scan
    pub device: PathBuf,
    /// Block-size multiplier; `None` uses the plan's default
    pub scale: Option<u32>,
    pub workers: usize,
    /// Sector size for image files
    pub sector_size: Option<u32>,
    pub success_log: PathBuf,
    pub failure_log: PathBuf,
    /// Optional JSON report destination
    pub report: Option<PathBuf>,
    pub progress: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            device: PathBuf::new(),
            scale: None,
            workers: num_cpus::get().max(1),
            sector_size: None,
            success_log: PathBuf::from(DEFAULT_SUCCESS_LOG),
            failure_log: PathBuf::from(DEFAULT_FAILURE_LOG),
            report: None,
            progress: true,
        }
    }
}

impl VerifyOptions {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Zero is kept as given; the worker pool rejects it.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_sector_size(mut self, sector_size: u32) -> Self {
        self.sector_size = Some(sector_size);
        self
    }

    pub fn with_logs(mut self, success: impl Into<PathBuf>, failure: impl Into<PathBuf>) -> Self {
        self.success_log = success.into();
        self.failure_log = failure.into();
        self
    }

    pub fn with_report(mut self, path: impl Into<PathBuf>) -> Self {
        self.report = Some(path.into());
        self
    }

    pub fn without_progress(mut self) -> Self {
        self.progress = false;
        self
    }
}

/// Options for filling a mounted filesystem
#[derive(Debug, Clone)]
pub struct FillOptions {
    pub mount: PathBuf,
    /// Output file; defaults to `FillData` under the mount point
    pub file: PathBuf,
    /// Target share of the filesystem in use, 1..=100
    pub percent: u8,
    pub progress: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            mount: PathBuf::new(),
            file: PathBuf::from(FILL_FILE_NAME),
            percent: DEFAULT_FILL_PERCENT,
            progress: true,
        }
    }
}

impl FillOptions {
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        let mount = mount.into();
        Self {
            file: mount.join(FILL_FILE_NAME),
            mount,
            ..Default::default()
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = file.into();
        self
    }

    pub fn with_percent(mut self, percent: u8) -> Self {
        self.percent = percent;
        self
    }

    pub fn without_progress(mut self) -> Self {
        self.progress = false;
        self
    }
}
