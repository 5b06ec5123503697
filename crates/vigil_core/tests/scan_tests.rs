//! End-to-end scan tests against in-memory backing stores.

use std::collections::{BTreeSet, HashMap};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use vigil_core::{
    BlockOutcome, BlockPlan, BlockSource, Geometry, OutcomeLedger, ScanError, ScanOrchestrator,
    ScanProgress, WorkerPool,
};

const EIO: i32 = 5;

// ============================================================================
// Fixtures
// ============================================================================

enum Fault {
    Short(usize),
    Errno(i32),
}

/// A RAM-backed device. `data` may be shorter than the geometry handed to the
/// plan, which models a store truncated below its advertised size.
struct MemoryDevice {
    data: Vec<u8>,
    faults: HashMap<u64, Fault>,
}

impl MemoryDevice {
    fn new(len: usize) -> Self {
        Self {
            data: (0..len).map(|i| (i % 251) as u8).collect(),
            faults: HashMap::new(),
        }
    }

    fn with_fault(mut self, offset: u64, fault: Fault) -> Self {
        self.faults.insert(offset, fault);
        self
    }
}

impl BlockSource for MemoryDevice {
    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> io::Result<usize> {
        match self.faults.get(&offset) {
            Some(Fault::Errno(errno)) => return Err(io::Error::from_raw_os_error(*errno)),
            Some(Fault::Short(n)) => {
                let start = offset as usize;
                buffer[..*n].copy_from_slice(&self.data[start..start + n]);
                return Ok(*n);
            }
            None => {}
        }

        let start = offset as usize;
        if start >= self.data.len() {
            return Ok(0);
        }
        let n = buffer.len().min(self.data.len() - start);
        buffer[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Write sink that flags any two `write` calls overlapping in time.
#[derive(Clone, Default)]
struct ProbeSink {
    state: Arc<ProbeState>,
}

#[derive(Default)]
struct ProbeState {
    busy: AtomicBool,
    overlaps: AtomicUsize,
    bytes: Mutex<Vec<u8>>,
}

impl ProbeSink {
    fn overlaps(&self) -> usize {
        self.state.overlaps.load(Ordering::SeqCst)
    }

    fn text(&self) -> String {
        String::from_utf8(self.state.bytes.lock().unwrap().clone()).unwrap()
    }
}

impl Write for ProbeSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state.busy.swap(true, Ordering::SeqCst) {
            self.state.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        thread::yield_now();
        self.state.bytes.lock().unwrap().extend_from_slice(buf);
        self.state.busy.store(false, Ordering::SeqCst);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn plan(total_bytes: u64, sector: u32, scale: u32) -> BlockPlan {
    BlockPlan::new(Geometry::new(total_bytes, sector).unwrap(), Some(scale)).unwrap()
}

fn indices(text: &str) -> Vec<u64> {
    text.lines()
        .map(|line| {
            let rest = line.strip_prefix("Block ").expect("line prefix");
            let (index, _) = rest.split_once(':').expect("index separator");
            index.parse().expect("numeric index")
        })
        .collect()
}

// ============================================================================
// Reference scenario
// ============================================================================

#[test]
fn test_reference_scan_with_one_short_block() {
    let plan = plan(1_048_576, 512, 256);
    assert_eq!(plan.effective_block_size(), 131_072);
    assert_eq!(plan.total_blocks(), 8);

    let device = MemoryDevice::new(1_048_576).with_fault(5 * 131_072, Fault::Short(131_000));
    let pool = WorkerPool::new(device, plan, 4).unwrap();
    let ledger = OutcomeLedger::new(Vec::new(), Vec::new());

    let summary = ScanOrchestrator::new(&pool, &ledger).run().unwrap();

    assert_eq!(summary.total, 8);
    assert_eq!(summary.processed, 8);
    assert_eq!(summary.succeeded, 7);
    assert_eq!(summary.short_reads, 1);
    assert_eq!(summary.read_errors, 0);
    assert!(!summary.is_clean());

    let (success, failure) = ledger.finish().unwrap();
    let success = String::from_utf8(success).unwrap();
    let failure = String::from_utf8(failure).unwrap();

    let mut ok = indices(&success);
    ok.sort_unstable();
    assert_eq!(ok, vec![0, 1, 2, 3, 4, 6, 7]);
    assert_eq!(
        failure,
        "Block 5: Incomplete block read: got 131000 of 131072 bytes\n"
    );
}

// ============================================================================
// Completeness and classification
// ============================================================================

#[test]
fn test_healthy_store_is_all_success() {
    let plan = plan(64 * 4096, 512, 8);
    let pool = WorkerPool::new(MemoryDevice::new(64 * 4096), plan, 3).unwrap();
    let ledger = OutcomeLedger::new(Vec::new(), Vec::new());

    let summary = ScanOrchestrator::new(&pool, &ledger).run().unwrap();
    assert!(summary.is_clean());
    assert_eq!(summary.succeeded, 64);

    let (success, failure) = ledger.finish().unwrap();
    assert!(failure.is_empty());

    let seen: BTreeSet<u64> = indices(&String::from_utf8(success).unwrap())
        .into_iter()
        .collect();
    assert_eq!(seen, (0..64).collect());
}

#[test]
fn test_truncated_store_never_reports_success_past_the_end() {
    // Geometry claims 16 blocks of 4 KiB, the store holds 10.5 of them.
    let plan = plan(16 * 4096, 512, 8);
    let device = MemoryDevice::new(10 * 4096 + 2048);
    let pool = WorkerPool::new(device, plan, 4).unwrap();
    let ledger = OutcomeLedger::new(Vec::new(), Vec::new());

    let summary = ScanOrchestrator::new(&pool, &ledger).run().unwrap();
    assert_eq!(summary.processed, 16);
    assert_eq!(summary.succeeded, 10);
    assert_eq!(summary.failed, 6);

    let (success, failure) = ledger.finish().unwrap();
    assert!(indices(&String::from_utf8(success).unwrap())
        .iter()
        .all(|&i| i < 10));

    let failure = String::from_utf8(failure).unwrap();
    let mut failed = indices(&failure);
    failed.sort_unstable();
    assert_eq!(failed, (10..16).collect::<Vec<_>>());
    assert!(failure.contains("Block 10: Incomplete block read: got 2048 of 4096 bytes"));
    assert!(failure.contains("Block 15: Incomplete block read: got 0 of 4096 bytes"));
}

#[test]
fn test_read_errors_are_recorded_and_scan_continues() {
    let plan = plan(8 * 1024, 512, 2);
    let device = MemoryDevice::new(8 * 1024)
        .with_fault(3 * 1024, Fault::Errno(EIO))
        .with_fault(6 * 1024, Fault::Errno(EIO));
    let pool = WorkerPool::new(device, plan, 2).unwrap();
    let ledger = OutcomeLedger::new(Vec::new(), Vec::new());

    let summary = ScanOrchestrator::new(&pool, &ledger).run().unwrap();
    assert_eq!(summary.read_errors, 2);
    assert_eq!(summary.short_reads, 0);
    assert_eq!(summary.succeeded, 6);

    let (_, failure) = ledger.finish().unwrap();
    let failure = String::from_utf8(failure).unwrap();
    let expected = io::Error::from_raw_os_error(EIO).to_string();
    assert!(failure.contains(&format!("Block 3: Error reading block: {expected}")));
    assert!(failure.contains(&format!("Block 6: Error reading block: {expected}")));
}

#[test]
fn test_read_error_keeps_errno() {
    let plan = plan(2 * 512, 512, 1);
    let device = MemoryDevice::new(1024).with_fault(512, Fault::Errno(EIO));
    let pool = WorkerPool::new(device, plan, 1).unwrap();

    match pool.verify_block(1) {
        BlockOutcome::ReadError(failure) => assert_eq!(failure.errno, Some(EIO)),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn test_trailing_partial_block_is_not_scanned() {
    let plan = plan(10 * 4096 + 100, 512, 8);
    let pool = WorkerPool::new(MemoryDevice::new(10 * 4096 + 100), plan, 4).unwrap();
    let ledger = OutcomeLedger::new(Vec::new(), Vec::new());

    let summary = ScanOrchestrator::new(&pool, &ledger).run().unwrap();
    assert_eq!(summary.total, 10);
    assert_eq!(summary.processed, 10);
    assert!(summary.is_clean());
}

#[test]
fn test_empty_plan_produces_empty_ledger() {
    let plan = plan(4096, 512, 256);
    let pool = WorkerPool::new(MemoryDevice::new(4096), plan, 2).unwrap();
    let ledger = OutcomeLedger::new(Vec::new(), Vec::new());

    let summary = ScanOrchestrator::new(&pool, &ledger).run().unwrap();
    assert_eq!(summary.total, 0);
    assert_eq!(summary.processed, 0);
    assert!(summary.is_clean());
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_ledger_lines_never_interleave_under_stress() {
    let blocks = 10_000u64;
    let plan = plan(blocks * 512, 512, 1);
    let device = MemoryDevice::new((blocks * 512) as usize)
        .with_fault(17 * 512, Fault::Errno(EIO))
        .with_fault(4_321 * 512, Fault::Short(100));
    let pool = WorkerPool::new(device, plan, 8).unwrap();

    let success = ProbeSink::default();
    let failure = ProbeSink::default();
    let ledger = OutcomeLedger::new(success.clone(), failure.clone());

    let summary = ScanOrchestrator::new(&pool, &ledger).run().unwrap();
    assert_eq!(summary.processed, blocks);
    assert_eq!(summary.failed, 2);

    assert_eq!(success.overlaps(), 0);
    assert_eq!(failure.overlaps(), 0);

    let success_text = success.text();
    let failure_text = failure.text();
    assert!(success_text
        .lines()
        .all(|line| line.ends_with(": Read successful")));

    let mut all: Vec<u64> = indices(&success_text);
    all.extend(indices(&failure_text));
    assert_eq!(all.len() as u64, blocks);

    let unique: BTreeSet<u64> = all.into_iter().collect();
    assert_eq!(unique, (0..blocks).collect());
}

/// Records how many reads are in flight and whether a read ever started
/// before the previous wave had fully completed.
struct BarrierProbe {
    inner: MemoryDevice,
    width: u64,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicU64,
    violations: AtomicUsize,
    block_size: u64,
}

impl BlockSource for BarrierProbe {
    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> io::Result<usize> {
        let index = offset / self.block_size;
        let wave_start = index / self.width * self.width;
        if self.completed.load(Ordering::SeqCst) < wave_start {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_micros(200));
        let result = self.inner.read_at(offset, buffer);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }
}

#[test]
fn test_waves_are_bounded_and_barriered() {
    let workers = 4;
    let plan = plan(37 * 512, 512, 1);
    let probe = BarrierProbe {
        inner: MemoryDevice::new(37 * 512),
        width: workers as u64,
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
        completed: AtomicU64::new(0),
        violations: AtomicUsize::new(0),
        block_size: 512,
    };
    let pool = WorkerPool::new(&probe, plan, workers).unwrap();
    let ledger = OutcomeLedger::new(Vec::new(), Vec::new());

    let summary = ScanOrchestrator::new(&pool, &ledger).run().unwrap();
    assert_eq!(summary.processed, 37);
    assert!(probe.peak.load(Ordering::SeqCst) <= workers);
    assert_eq!(probe.violations.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Cancellation and progress
// ============================================================================

#[test]
fn test_cancelled_before_start_reads_nothing() {
    let plan = plan(16 * 512, 512, 1);
    let pool = WorkerPool::new(MemoryDevice::new(16 * 512), plan, 4).unwrap();
    let ledger = OutcomeLedger::new(Vec::new(), Vec::new());

    let summary = ScanOrchestrator::new(&pool, &ledger)
        .with_cancellation(Arc::new(AtomicBool::new(false)))
        .run()
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.processed, 0);
    assert!(!summary.is_clean());
}

#[test]
fn test_cancellation_takes_effect_at_wave_boundary() {
    let plan = plan(16 * 512, 512, 1);
    let pool = WorkerPool::new(MemoryDevice::new(16 * 512), plan, 4).unwrap();
    let ledger = OutcomeLedger::new(Vec::new(), Vec::new());

    let running = Arc::new(AtomicBool::new(true));
    let stop = Arc::clone(&running);
    let waves_seen = Arc::new(AtomicUsize::new(0));
    let waves = Arc::clone(&waves_seen);

    let summary = ScanOrchestrator::new(&pool, &ledger)
        .with_cancellation(running)
        .with_progress(Box::new(move |progress: &ScanProgress| {
            waves.fetch_add(1, Ordering::SeqCst);
            assert_eq!(progress.total, 16);
            stop.store(false, Ordering::SeqCst);
        }))
        .run()
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.processed, 4);
    assert_eq!(waves_seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_progress_reports_every_wave() {
    let plan = plan(10 * 512, 512, 1);
    let pool = WorkerPool::new(MemoryDevice::new(10 * 512), plan, 4).unwrap();
    let ledger = OutcomeLedger::new(Vec::new(), Vec::new());

    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&snapshots);

    ScanOrchestrator::new(&pool, &ledger)
        .with_progress(Box::new(move |progress: &ScanProgress| {
            sink.lock().unwrap().push((progress.wave, progress.processed));
        }))
        .run()
        .unwrap();

    assert_eq!(*snapshots.lock().unwrap(), vec![(0, 4), (1, 8), (2, 10)]);
}

// ============================================================================
// Fatal preconditions
// ============================================================================

struct DirectOnly(MemoryDevice);

impl BlockSource for DirectOnly {
    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> io::Result<usize> {
        self.0.read_at(offset, buffer)
    }

    fn size(&self) -> u64 {
        self.0.size()
    }

    fn alignment(&self) -> usize {
        4096
    }
}

#[test]
fn test_misaligned_plan_aborts_before_any_read() {
    let plan = plan(8 * 512, 512, 1);
    let result = WorkerPool::new(DirectOnly(MemoryDevice::new(8 * 512)), plan, 2);
    assert!(matches!(
        result,
        Err(ScanError::Misaligned {
            block_size: 512,
            alignment: 4096
        })
    ));
}

#[test]
fn test_direct_alignment_is_honoured_by_buffers() {
    let plan = plan(8 * 4096, 512, 8);
    let pool = WorkerPool::new(DirectOnly(MemoryDevice::new(8 * 4096)), plan, 2).unwrap();
    let ledger = OutcomeLedger::new(Vec::new(), Vec::new());
    let summary = ScanOrchestrator::new(&pool, &ledger).run().unwrap();
    assert!(summary.is_clean());
}

// ============================================================================
// Durability
// ============================================================================

#[test]
fn test_ledger_files_hold_every_processed_block_at_wave_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let success_path = dir.path().join("success");
    let failure_path = dir.path().join("failed");

    let plan = plan(64 * 512, 512, 1);
    let pool = WorkerPool::new(MemoryDevice::new(64 * 512), plan, 4).unwrap();
    let ledger = OutcomeLedger::create(&success_path, &failure_path).unwrap();

    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let on_disk = success_path.clone();

    let summary = ScanOrchestrator::new(&pool, &ledger)
        .with_progress(Box::new(move |progress: &ScanProgress| {
            let lines = std::fs::read_to_string(&on_disk).unwrap().lines().count();
            sink.lock().unwrap().push((progress.processed, lines as u64));
        }))
        .run()
        .unwrap();

    assert!(summary.is_clean());
    let observed = observed.lock().unwrap();
    assert_eq!(observed.len(), 16);
    for (processed, lines) in observed.iter() {
        assert_eq!(processed, lines);
    }
    assert_eq!(observed.last(), Some(&(64, 64)));
}
