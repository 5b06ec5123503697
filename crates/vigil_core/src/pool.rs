//! Fixed-size pool of block readers.
//!
//! The pool owns one aligned buffer per worker slot and a dedicated rayon
//! thread pool of the same width. Block `i` always uses slot `i % workers`, so
//! inside a wave starting at a multiple of the width, slot `k` serves block
//! `wave_start + k` and no two in-flight reads share a buffer.

use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ops::Range;
use tracing::{debug, warn};

use crate::aligned_buffer::{AlignedBuffer, DEFAULT_ALIGNMENT};
use crate::error::{LedgerError, Result, ScanError};
use crate::plan::BlockPlan;
use crate::traits::BlockSource;
use crate::types::{BlockIndex, BlockOutcome, ReadFailure};

pub struct WorkerPool<S> {
    source: S,
    plan: BlockPlan,
    slots: Vec<Mutex<AlignedBuffer>>,
    threads: ThreadPool,
}

impl<S: BlockSource> WorkerPool<S> {
    /// Allocates the worker buffers and checks them against the source's
    /// alignment requirement. Any mismatch is fatal here, before a single
    /// block is read.
    pub fn new(source: S, plan: BlockPlan, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(ScanError::NoWorkers);
        }

        let block_size = plan.effective_block_size() as usize;
        let alignment = source.alignment().max(1);

        if !alignment.is_power_of_two() || !block_size.is_multiple_of(alignment) {
            return Err(ScanError::Misaligned {
                block_size,
                alignment,
            });
        }

        if plan.covered_bytes() > source.size() {
            warn!(
                planned = plan.covered_bytes(),
                available = source.size(),
                "source is smaller than its geometry, trailing blocks will read short"
            );
        }

        let slots = (0..workers)
            .map(|_| AlignedBuffer::new(block_size, alignment.max(DEFAULT_ALIGNMENT)))
            .collect::<Result<Vec<_>>>()?;

        if let Some(buffer) = slots.iter().find(|b| !b.is_aligned_to(alignment)) {
            return Err(ScanError::MisalignedBuffer {
                address: buffer.as_ptr() as usize,
                alignment,
            });
        }

        let threads = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("vigil-worker-{i}"))
            .build()?;

        debug!(workers, block_size, alignment, "worker pool ready");

        Ok(Self {
            source,
            plan,
            slots: slots.into_iter().map(Mutex::new).collect(),
            threads,
        })
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn plan(&self) -> &BlockPlan {
        &self.plan
    }

    /// Reads block `index` once and classifies the result.
    ///
    /// Safe to call from any number of threads; callers that share a slot
    /// simply take turns on its buffer.
    pub fn verify_block(&self, index: BlockIndex) -> BlockOutcome {
        let slot = (index % self.slots.len() as u64) as usize;
        let mut buffer = self.slots[slot].lock();

        let offset = self.plan.offset_of(index);
        let expected = buffer.len();

        match self.source.read_at(offset, buffer.as_mut_slice()) {
            Ok(got) if got == expected => BlockOutcome::Success,
            Ok(got) => BlockOutcome::ShortRead { got, expected },
            Err(err) => BlockOutcome::ReadError(ReadFailure::from(&err)),
        }
    }

    /// Verifies every block of `wave` concurrently and hands each outcome to
    /// `sink`. Returns once all of them have been handed over.
    pub fn dispatch<F>(&self, wave: Range<BlockIndex>, sink: F) -> Result<(), LedgerError>
    where
        F: Fn(BlockIndex, BlockOutcome) -> Result<(), LedgerError> + Sync,
    {
        self.threads.install(|| {
            wave.into_par_iter()
                .try_for_each(|index| sink(index, self.verify_block(index)))
        })
    }
}
