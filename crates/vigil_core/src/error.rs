use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::LedgerStream;

/// Failures while establishing the geometry of a scan target.
///
/// Every variant is fatal: the verifier never substitutes a guessed size.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("{path} is not a block device")]
    NotABlockDevice { path: PathBuf },

    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{query} failed on {path}: {source}")]
    QueryFailed {
        path: PathBuf,
        query: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Unusable geometry: {total_bytes} bytes with native block size {native_block_size}")]
    Degenerate {
        total_bytes: u64,
        native_block_size: u32,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("Scale factor must be greater than 0")]
    ZeroScale,

    #[error("Scale factor {0} is not a power of two")]
    ScaleNotPowerOfTwo(u32),

    #[error("Block size {native_block_size} x {scale} overflows a 32-bit block size")]
    Overflow { native_block_size: u32, scale: u32 },
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to create {stream} log at {path}: {source}")]
    Create {
        stream: LedgerStream,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to record block {index} in the {stream} log: {source}")]
    Write {
        stream: LedgerStream,
        index: u64,
        #[source]
        source: io::Error,
    },

    #[error("Failed to flush the {stream} log: {source}")]
    Flush {
        stream: LedgerStream,
        #[source]
        source: io::Error,
    },
}

/// Fatal conditions of a scan run. Per-block read failures never appear here.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Worker count must be greater than 0")]
    NoWorkers,

    #[error("Invalid buffer layout: {size} bytes aligned to {alignment}")]
    InvalidBuffer { size: usize, alignment: usize },

    #[error("Block size {block_size} is not a multiple of the required I/O alignment {alignment}")]
    Misaligned { block_size: usize, alignment: usize },

    #[error("Worker buffer at {address:#x} is not aligned to {alignment} bytes")]
    MisalignedBuffer { address: usize, alignment: usize },

    #[error("Failed to start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type Result<T, E = ScanError> = std::result::Result<T, E>;
