//! Read-only device handle.
//!
//! One handle is opened per scan and shared by every worker; reads carry
//! their own offset (`pread`), so no file position is shared between them.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vigil_core::{BlockSource, Geometry, GeometryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoMode {
    /// `O_DIRECT`: the page cache is bypassed, buffers and offsets must be
    /// sector aligned.
    Direct,
    Buffered,
}

impl fmt::Display for IoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Buffered => f.write_str("buffered"),
        }
    }
}

pub struct DeviceHandle {
    file: File,
    path: PathBuf,
    size: u64,
    sector_size: u32,
    mode: IoMode,
}

impl DeviceHandle {
    /// Opens `path` for direct I/O, falling back to buffered reads when the
    /// target or the filesystem refuses `O_DIRECT`.
    pub fn open(path: impl AsRef<Path>, geometry: &Geometry) -> Result<Self, GeometryError> {
        let path = path.as_ref();

        match open_direct(path) {
            Ok(file) => {
                info!(path = %path.display(), mode = %IoMode::Direct, "device opened");
                Ok(Self::from_parts(file, path, geometry, IoMode::Direct))
            }
            Err(err) => {
                debug!(
                    path = %path.display(),
                    error = %err,
                    "O_DIRECT unavailable, falling back to buffered reads"
                );
                Self::open_buffered(path, geometry)
            }
        }
    }

    pub fn open_buffered(
        path: impl AsRef<Path>,
        geometry: &Geometry,
    ) -> Result<Self, GeometryError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(|source| GeometryError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;

        #[cfg(target_os = "linux")]
        {
            use rustix::fs::{Advice, fadvise};
            // Hints only; a refusal changes nothing about correctness.
            let _ = fadvise(&file, 0, None, Advice::Sequential);
            let _ = fadvise(&file, 0, None, Advice::NoReuse);
        }

        info!(path = %path.display(), mode = %IoMode::Buffered, "device opened");
        Ok(Self::from_parts(file, path, geometry, IoMode::Buffered))
    }

    fn from_parts(file: File, path: &Path, geometry: &Geometry, mode: IoMode) -> Self {
        Self {
            file,
            path: path.to_path_buf(),
            size: geometry.total_bytes(),
            sector_size: geometry.native_block_size(),
            mode,
        }
    }

    #[inline]
    pub fn mode(&self) -> IoMode {
        self.mode
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("sector_size", &self.sector_size)
            .field("mode", &self.mode)
            .finish()
    }
}

impl BlockSource for DeviceHandle {
    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> io::Result<usize> {
        rustix::io::pread(&self.file, buffer, offset).map_err(io::Error::from)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn alignment(&self) -> usize {
        match self.mode {
            IoMode::Direct => self.sector_size as usize,
            IoMode::Buffered => 1,
        }
    }
}

#[cfg(target_os = "linux")]
fn open_direct(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_DIRECT)
        .open(path)
}

#[cfg(not(target_os = "linux"))]
fn open_direct(_path: &Path) -> io::Result<File> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "O_DIRECT is not supported on this platform",
    ))
}
