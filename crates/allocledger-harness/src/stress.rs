//! Concurrent insert stress run.
//!
//! N threads each insert M blocks into one shared registry; afterwards the
//! live count must be exactly N×M and every returned address must report the
//! size it was granted with.

use std::thread::ScopedJoinHandle;
use std::time::Instant;

use allocledger_core::{LeakReporting, LedgerConfig, MetricsSnapshot, Registry, SystemAllocator};
use serde::Serialize;

use crate::error::HarnessError;

/// Stress run parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressConfig {
    pub threads: usize,
    pub per_thread: usize,
    /// Base block size; block `i` of a thread gets `block_size + i % 64` bytes.
    pub block_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            per_thread: 1_000,
            block_size: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StressReport {
    pub threads: usize,
    pub per_thread: usize,
    pub expected: usize,
    pub live_count: usize,
    pub capacity: usize,
    /// Addresses whose reported size differed from the granted size.
    pub mismatches: usize,
    /// Inserts that returned null.
    pub failed_inserts: usize,
    pub elapsed_ms: u64,
    pub passed: bool,
    pub metrics: MetricsSnapshot,
}

/// Run the concurrent insert scenario on a fresh registry over the C heap.
pub fn run_stress(config: StressConfig) -> Result<StressReport, HarnessError> {
    if config.threads == 0 || config.per_thread == 0 {
        return Err(HarnessError::InvalidArgument(
            "threads and per-thread count must be non-zero".to_string(),
        ));
    }
    if config.block_size == 0 {
        return Err(HarnessError::InvalidArgument(
            "block size must be non-zero".to_string(),
        ));
    }

    let registry = Registry::with_config(
        SystemAllocator,
        LedgerConfig::default().with_leak_reporting(LeakReporting::Off),
    );
    registry.initialize()?;

    let started = Instant::now();
    let per_thread: Vec<(Vec<(usize, usize)>, usize)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..config.threads)
            .map(|_| {
                let registry = &registry;
                scope.spawn(move || {
                    let mut granted = Vec::with_capacity(config.per_thread);
                    let mut failed = 0;
                    for i in 0..config.per_thread {
                        let size = config.block_size + i % 64;
                        match registry.allocate(size) {
                            Some(p) => granted.push((p.as_ptr().addr(), size)),
                            None => failed += 1,
                        }
                    }
                    (granted, failed)
                })
            })
            .collect();
        join_workers(handles)
    })?;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let expected = config.threads * config.per_thread;
    let failed_inserts: usize = per_thread.iter().map(|(_, failed)| failed).sum();
    let mismatches = per_thread
        .iter()
        .flat_map(|(granted, _)| granted)
        .filter(|&&(addr, size)| {
            registry.size_of(std::ptr::with_exposed_provenance(addr)) != size
        })
        .count();
    let live_count = registry.live_count();
    let capacity = registry.capacity();
    let metrics = registry.metrics().snapshot();
    registry.teardown();

    Ok(StressReport {
        threads: config.threads,
        per_thread: config.per_thread,
        expected,
        live_count,
        capacity,
        mismatches,
        failed_inserts,
        elapsed_ms,
        passed: live_count == expected && mismatches == 0 && failed_inserts == 0,
        metrics,
    })
}

/// Join every worker in spawn order; the first panic becomes an error.
fn join_workers<T>(handles: Vec<ScopedJoinHandle<'_, T>>) -> Result<Vec<T>, HarnessError> {
    handles
        .into_iter()
        .enumerate()
        .map(|(thread, h)| h.join().map_err(|_| HarnessError::WorkerPanicked { thread }))
        .collect()
}
