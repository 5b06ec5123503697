use serde::Serialize;
use std::fmt;
use std::io;
use std::time::Duration;

use crate::error::GeometryError;

/// Index of a scan block, in `[0, total_blocks)`.
pub type BlockIndex = u64;

/// Addressable size and native block size of a scan target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Geometry {
    total_bytes: u64,
    native_block_size: u32,
}

impl Geometry {
    /// Rejects zero sizes and sector sizes that cannot serve as a direct I/O
    /// alignment.
    pub fn new(total_bytes: u64, native_block_size: u32) -> Result<Self, GeometryError> {
        if total_bytes == 0 || native_block_size == 0 || !native_block_size.is_power_of_two() {
            return Err(GeometryError::Degenerate {
                total_bytes,
                native_block_size,
            });
        }

        Ok(Self {
            total_bytes,
            native_block_size,
        })
    }

    #[inline]
    #[must_use]
    pub const fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    #[inline]
    #[must_use]
    pub const fn native_block_size(&self) -> u32 {
        self.native_block_size
    }
}

/// Why a positioned read failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFailure {
    pub errno: Option<i32>,
    pub message: String,
}

impl From<&io::Error> for ReadFailure {
    fn from(err: &io::Error) -> Self {
        Self {
            errno: err.raw_os_error(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ReadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of verifying a single block. Produced exactly once per block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Success,
    ReadError(ReadFailure),
    ShortRead { got: usize, expected: usize },
}

impl BlockOutcome {
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    #[inline]
    #[must_use]
    pub const fn stream(&self) -> LedgerStream {
        match self {
            Self::Success => LedgerStream::Success,
            Self::ReadError(_) | Self::ShortRead { .. } => LedgerStream::Failure,
        }
    }
}

impl fmt::Display for BlockOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("Read successful"),
            Self::ReadError(failure) => write!(f, "Error reading block: {failure}"),
            Self::ShortRead { got, expected } => {
                write!(f, "Incomplete block read: got {got} of {expected} bytes")
            }
        }
    }
}

/// The two append-only result streams of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerStream {
    Success,
    Failure,
}

impl fmt::Display for LedgerStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failure => f.write_str("failure"),
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Blocks in the plan.
    pub total: u64,
    /// Blocks that produced a ledger entry.
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub short_reads: u64,
    pub read_errors: u64,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl ScanSummary {
    /// True when every planned block was read successfully.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        !self.cancelled && self.failed == 0 && self.processed == self.total
    }
}

/// Snapshot handed to progress observers after each wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub wave: u64,
    pub processed: u64,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
}
