//! Geometry discovery.
//!
//! The way a target is measured is decided once, from its file type, and
//! recorded as a [`GeometrySource`]:
//! - block special files are asked through `BLKGETSIZE64` / `BLKSSZGET`;
//! - regular files (disk images) report their length, and the operator must
//!   name the sector size explicitly;
//! - directories are mount points, measured with `statvfs`; only the filler
//!   consumes that, the verifier refuses it.

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use tracing::{debug, info};
use vigil_core::{Geometry, GeometryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometrySource {
    BlockDeviceIoctl,
    ImageFile,
    FilesystemStat,
}

impl GeometrySource {
    pub fn resolve(path: &Path) -> Result<Self, GeometryError> {
        let metadata = fs::metadata(path).map_err(|source| GeometryError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;

        let file_type = metadata.file_type();
        if file_type.is_block_device() {
            Ok(Self::BlockDeviceIoctl)
        } else if file_type.is_file() {
            Ok(Self::ImageFile)
        } else if file_type.is_dir() {
            Ok(Self::FilesystemStat)
        } else {
            Err(GeometryError::NotABlockDevice {
                path: path.to_path_buf(),
            })
        }
    }
}

impl fmt::Display for GeometrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockDeviceIoctl => f.write_str("block device ioctl"),
            Self::ImageFile => f.write_str("image file"),
            Self::FilesystemStat => f.write_str("filesystem statistics"),
        }
    }
}

/// Geometry of a scan target together with how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub source: GeometrySource,
    pub geometry: Geometry,
}

/// Measures a verification target.
///
/// `sector_size` is required for image files and ignored for block devices,
/// whose logical sector size always comes from the kernel.
pub fn probe(path: impl AsRef<Path>, sector_size: Option<u32>) -> Result<Probe, GeometryError> {
    let path = path.as_ref();
    let source = GeometrySource::resolve(path)?;

    let query_failed = |query: &'static str| {
        move |source: io::Error| GeometryError::QueryFailed {
            path: path.to_path_buf(),
            query,
            source,
        }
    };

    let geometry = match source {
        GeometrySource::BlockDeviceIoctl => {
            let file = File::open(path).map_err(|source| GeometryError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;

            let total_bytes = block_device_size(&file).map_err(query_failed("BLKGETSIZE64"))?;
            let native = logical_sector_size(&file).map_err(query_failed("BLKSSZGET"))?;

            if let Some(requested) = sector_size.filter(|&s| s != native) {
                debug!(requested, native, "sector size override ignored for block device");
            }

            Geometry::new(total_bytes, native)?
        }
        GeometrySource::ImageFile => {
            let native = sector_size.ok_or_else(|| GeometryError::NotABlockDevice {
                path: path.to_path_buf(),
            })?;
            let total_bytes = fs::metadata(path).map_err(query_failed("stat"))?.len();

            Geometry::new(total_bytes, native)?
        }
        GeometrySource::FilesystemStat => {
            return Err(GeometryError::NotABlockDevice {
                path: path.to_path_buf(),
            });
        }
    };

    info!(
        path = %path.display(),
        %source,
        total_bytes = geometry.total_bytes(),
        native_block_size = geometry.native_block_size(),
        "geometry established"
    );

    Ok(Probe { source, geometry })
}

#[cfg(target_os = "linux")]
fn block_device_size(file: &File) -> io::Result<u64> {
    use std::os::unix::io::AsRawFd;

    const BLKGETSIZE64: libc::c_ulong = 0x80081272;

    let mut size: u64 = 0;
    // SAFETY: BLKGETSIZE64 writes a single u64 through the pointer.
    let result = unsafe { libc::ioctl(file.as_raw_fd(), BLKGETSIZE64, &mut size) };

    if result == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(size)
    }
}

#[cfg(target_os = "linux")]
fn logical_sector_size(file: &File) -> io::Result<u32> {
    rustix::fs::ioctl_blksszget(file).map_err(io::Error::from)
}

#[cfg(not(target_os = "linux"))]
fn block_device_size(_file: &File) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Not supported on this platform",
    ))
}

#[cfg(not(target_os = "linux"))]
fn logical_sector_size(_file: &File) -> io::Result<u32> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Not supported on this platform",
    ))
}

/// Capacity of a mounted filesystem as reported by `statvfs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilesystemCapacity {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub fragment_size: u64,
}

impl FilesystemCapacity {
    #[inline]
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }
}

pub fn filesystem_capacity(path: impl AsRef<Path>) -> Result<FilesystemCapacity, GeometryError> {
    let path = path.as_ref();
    let stat = rustix::fs::statvfs(path).map_err(|errno| GeometryError::QueryFailed {
        path: path.to_path_buf(),
        query: "statvfs",
        source: errno.into(),
    })?;

    let fragment_size = stat.f_frsize;
    Ok(FilesystemCapacity {
        total_bytes: stat.f_blocks.saturating_mul(fragment_size),
        free_bytes: stat.f_bfree.saturating_mul(fragment_size),
        fragment_size,
    })
}
