//! Atomic counters for registry observability.
//!
//! All counters use relaxed ordering; they are diagnostic, not
//! synchronization primitives.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-registry operation counters.
#[derive(Debug)]
pub struct RegistryMetrics {
    /// Allocations recorded by insert (including resize fallbacks).
    pub inserts: AtomicU64,
    /// Insert/resize requests with a zero byte count.
    pub zero_length_requests: AtomicU64,
    /// Raw allocation, raw resize or table growth failures.
    pub alloc_failures: AtomicU64,
    /// Successful in-place resizes of tracked allocations.
    pub resizes: AtomicU64,
    /// Resizes of untracked addresses served as fresh inserts.
    pub resize_fallbacks: AtomicU64,
    /// Tracked allocations released by remove.
    pub removes: AtomicU64,
    /// Remove calls for addresses not in the table.
    pub untracked_removes: AtomicU64,
    /// Table doublings.
    pub table_grows: AtomicU64,
    /// Table halvings.
    pub table_shrinks: AtomicU64,
    /// Allocations released by teardown.
    pub leaks_swept: AtomicU64,
    /// Data operations issued while the registry was not initialized.
    pub uninitialized_calls: AtomicU64,
}

impl RegistryMetrics {
    /// Create a new zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inserts: AtomicU64::new(0),
            zero_length_requests: AtomicU64::new(0),
            alloc_failures: AtomicU64::new(0),
            resizes: AtomicU64::new(0),
            resize_fallbacks: AtomicU64::new(0),
            removes: AtomicU64::new(0),
            untracked_removes: AtomicU64::new(0),
            table_grows: AtomicU64::new(0),
            table_shrinks: AtomicU64::new(0),
            leaks_swept: AtomicU64::new(0),
            uninitialized_calls: AtomicU64::new(0),
        }
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment a counter by `n`.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Read a counter value.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            inserts: Self::get(&self.inserts),
            zero_length_requests: Self::get(&self.zero_length_requests),
            alloc_failures: Self::get(&self.alloc_failures),
            resizes: Self::get(&self.resizes),
            resize_fallbacks: Self::get(&self.resize_fallbacks),
            removes: Self::get(&self.removes),
            untracked_removes: Self::get(&self.untracked_removes),
            table_grows: Self::get(&self.table_grows),
            table_shrinks: Self::get(&self.table_shrinks),
            leaks_swept: Self::get(&self.leaks_swept),
            uninitialized_calls: Self::get(&self.uninitialized_calls),
        }
    }
}

impl Default for RegistryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of all registry counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub inserts: u64,
    pub zero_length_requests: u64,
    pub alloc_failures: u64,
    pub resizes: u64,
    pub resize_fallbacks: u64,
    pub removes: u64,
    pub untracked_removes: u64,
    pub table_grows: u64,
    pub table_shrinks: u64,
    pub leaks_swept: u64,
    pub uninitialized_calls: u64,
}
