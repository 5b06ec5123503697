//! The port between the scan logic and the storage it verifies.
//!
//! The worker pool only ever talks to a [`BlockSource`]; the Linux device
//! adapter lives in `vigil_io`, tests plug in in-memory stores.

use std::io;

/// A readable, fixed-size source of raw blocks, typically a disk or an image
/// file.
///
/// Reads are positioned: an implementation must not keep a shared cursor, so
/// that one source can be read from many workers at once without a lock.
///
/// # Example
///
/// ```ignore
/// struct RamDisk { bytes: Vec<u8> }
///
/// impl BlockSource for RamDisk {
///     fn read_at(&self, offset: u64, buffer: &mut [u8]) -> io::Result<usize> {
///         // Copy from `bytes[offset..]`
///     }
///
///     fn size(&self) -> u64 {
///         self.bytes.len() as u64
///     }
/// }
/// ```
pub trait BlockSource: Send + Sync {
    /// Issues a single read of up to `buffer.len()` bytes at `offset`.
    ///
    /// # Returns
    ///
    /// The number of bytes transferred. Implementations must not loop to
    /// complete a partial transfer: a short count is reported to the caller
    /// as is, so the verifier can classify it.
    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> io::Result<usize>;

    /// Returns the total size of the source in bytes.
    fn size(&self) -> u64;

    /// Returns the alignment, in bytes, that buffers, offsets and lengths must
    /// honour. `1` when unconstrained (buffered I/O).
    fn alignment(&self) -> usize {
        1
    }
}

impl<T: BlockSource + ?Sized> BlockSource for &T {
    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buffer)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn alignment(&self) -> usize {
        (**self).alignment()
    }
}
