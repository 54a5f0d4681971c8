//! Fault-injecting allocator used to exercise exhaustion paths.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::raw::{RawAllocator, SystemAllocator};

const NEVER: usize = usize::MAX;

/// Wraps another [`RawAllocator`] and fails on demand.
///
/// Also counts blocks handed out and returned, so tests can check that the
/// registry gives back everything it took, its own table included.
#[derive(Debug)]
pub struct FaultyAllocator<A: RawAllocator = SystemAllocator> {
    inner: A,
    /// Allocations still allowed before failing; `NEVER` disables the budget.
    alloc_budget: AtomicUsize,
    fail_resize: AtomicBool,
    allocs: AtomicU64,
    releases: AtomicU64,
}

impl Default for FaultyAllocator<SystemAllocator> {
    fn default() -> Self {
        Self::new(SystemAllocator)
    }
}

impl<A: RawAllocator> FaultyAllocator<A> {
    #[must_use]
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            alloc_budget: AtomicUsize::new(NEVER),
            fail_resize: AtomicBool::new(false),
            allocs: AtomicU64::new(0),
            releases: AtomicU64::new(0),
        }
    }

    /// Let the next `n` allocations succeed, then fail every one after.
    pub fn fail_after(&self, n: usize) {
        self.alloc_budget.store(n, Ordering::SeqCst);
    }

    /// Fail every allocation from now on.
    pub fn fail_allocs(&self) {
        self.fail_after(0);
    }

    /// Make every resize fail (or succeed again).
    pub fn set_fail_resize(&self, fail: bool) {
        self.fail_resize.store(fail, Ordering::SeqCst);
    }

    /// Clear every injected fault.
    pub fn heal(&self) {
        self.alloc_budget.store(NEVER, Ordering::SeqCst);
        self.fail_resize.store(false, Ordering::SeqCst);
    }

    /// Blocks handed out and not yet released.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.allocs
            .load(Ordering::SeqCst)
            .saturating_sub(self.releases.load(Ordering::SeqCst))
    }

    fn take_budget(&self) -> bool {
        self.alloc_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                NEVER => Some(NEVER),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok()
    }
}

impl<A: RawAllocator> RawAllocator for FaultyAllocator<A> {
    fn alloc(&self, size: usize, zeroed: bool) -> Option<NonNull<u8>> {
        if !self.take_budget() {
            return None;
        }
        let ptr = self.inner.alloc(size, zeroed)?;
        self.allocs.fetch_add(1, Ordering::SeqCst);
        Some(ptr)
    }

    unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>> {
        if self.fail_resize.load(Ordering::SeqCst) {
            return None;
        }
        // SAFETY: forwarded contract.
        unsafe { self.inner.resize(ptr, new_size) }
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        // SAFETY: forwarded contract.
        unsafe { self.inner.release(ptr) }
    }
}
