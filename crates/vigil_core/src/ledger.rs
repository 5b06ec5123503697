//! Durable record of per-block outcomes.
//!
//! Successful blocks go to one stream, failed blocks to another, one line per
//! block: `Block <index>: <description>`. Each stream sits behind its own
//! lock; the line is rendered before the lock is taken and written with a
//! single `write_all` while it is held.

use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::LedgerError;
use crate::types::{BlockIndex, BlockOutcome, LedgerStream};

pub struct OutcomeLedger<S, F> {
    success: Mutex<S>,
    failure: Mutex<F>,
    succeeded: AtomicU64,
    short_reads: AtomicU64,
    read_errors: AtomicU64,
}

impl OutcomeLedger<BufWriter<File>, BufWriter<File>> {
    /// Creates (truncating) the two log files.
    pub fn create(
        success_path: impl AsRef<Path>,
        failure_path: impl AsRef<Path>,
    ) -> Result<Self, LedgerError> {
        let open = |stream: LedgerStream, path: &Path| {
            File::create(path)
                .map(BufWriter::new)
                .map_err(|source| LedgerError::Create {
                    stream,
                    path: path.to_path_buf(),
                    source,
                })
        };

        let success = open(LedgerStream::Success, success_path.as_ref())?;
        let failure = open(LedgerStream::Failure, failure_path.as_ref())?;
        Ok(Self::new(success, failure))
    }
}

impl<S: Write + Send, F: Write + Send> OutcomeLedger<S, F> {
    pub fn new(success: S, failure: F) -> Self {
        Self {
            success: Mutex::new(success),
            failure: Mutex::new(failure),
            succeeded: AtomicU64::new(0),
            short_reads: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
        }
    }

    /// Appends one line for `index` to the stream matching `outcome`.
    pub fn record(&self, index: BlockIndex, outcome: &BlockOutcome) -> Result<(), LedgerError> {
        let line = format!("Block {index}: {outcome}\n");
        let stream = outcome.stream();

        let written = match stream {
            LedgerStream::Success => self.success.lock().write_all(line.as_bytes()),
            LedgerStream::Failure => self.failure.lock().write_all(line.as_bytes()),
        };
        written.map_err(|source| LedgerError::Write {
            stream,
            index,
            source,
        })?;

        let counter = match outcome {
            BlockOutcome::Success => &self.succeeded,
            BlockOutcome::ShortRead { .. } => &self.short_reads,
            BlockOutcome::ReadError(_) => &self.read_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    pub fn flush(&self) -> Result<(), LedgerError> {
        self.success
            .lock()
            .flush()
            .map_err(|source| LedgerError::Flush {
                stream: LedgerStream::Success,
                source,
            })?;
        self.failure
            .lock()
            .flush()
            .map_err(|source| LedgerError::Flush {
                stream: LedgerStream::Failure,
                source,
            })
    }

    #[inline]
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn short_reads(&self) -> u64 {
        self.short_reads.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn read_errors(&self) -> u64 {
        self.read_errors.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed(&self) -> u64 {
        self.short_reads() + self.read_errors()
    }

    #[inline]
    pub fn recorded(&self) -> u64 {
        self.succeeded() + self.failed()
    }

    /// Flushes and hands back both streams.
    pub fn finish(self) -> Result<(S, F), LedgerError> {
        self.flush()?;
        Ok((self.success.into_inner(), self.failure.into_inner()))
    }
}
