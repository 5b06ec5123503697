//! Core of the Vigil block verifier: geometry and plan types, the worker
//! pool, the outcome ledger and the wave-synchronous scan orchestrator.

pub mod aligned_buffer;
mod error;
pub mod ledger;
pub mod orchestrator;
pub mod plan;
pub mod pool;
mod traits;
mod types;

pub use aligned_buffer::{AlignedBuffer, DEFAULT_ALIGNMENT};
pub use error::{GeometryError, LedgerError, PlanError, Result, ScanError};
pub use ledger::OutcomeLedger;
pub use orchestrator::{ProgressCallback, ScanOrchestrator};
pub use plan::{BlockPlan, DEFAULT_SCALE};
pub use pool::WorkerPool;
pub use traits::BlockSource;
pub use types::{
    BlockIndex, BlockOutcome, Geometry, LedgerStream, ReadFailure, ScanProgress, ScanSummary,
};
