//! The allocation registry.
//!
//! Every block handed out through [`Registry::insert`] is recorded as an
//! `(address, size)` pair until it is removed, resized away or swept by
//! [`Registry::teardown`]. One `parking_lot::Mutex` guards the whole table and
//! is held for the full duration of every public operation.

use std::io::Write;
use std::ptr::NonNull;

use parking_lot::Mutex;

use crate::config::LedgerConfig;
use crate::error::RegistryError;
use crate::leak::{LeakRecord, SweepReport, write_leak_line};
use crate::metrics::RegistryMetrics;
use crate::raw::{RawAllocator, SystemAllocator};
use crate::table::{AllocationRecord, RecordTable, TableResize, plan_resize};

/// Thread-safe registry of live allocations.
///
/// Starts uninitialized. Data operations on an uninitialized registry return
/// their failure value (null, `0` or `false`) and are counted in
/// [`RegistryMetrics::uninitialized_calls`].
pub struct Registry<A: RawAllocator = SystemAllocator> {
    heap: A,
    config: LedgerConfig,
    table: Mutex<Option<RecordTable>>,
    metrics: RegistryMetrics,
}

impl Registry<SystemAllocator> {
    /// Registry over the C heap, configured from the environment.
    #[must_use]
    pub fn system() -> Self {
        Self::new(SystemAllocator)
    }
}

impl<A: RawAllocator> Registry<A> {
    /// Create an uninitialized registry configured from the environment.
    #[must_use]
    pub fn new(heap: A) -> Self {
        Self::with_config(heap, LedgerConfig::from_env())
    }

    /// Create an uninitialized registry with explicit configuration.
    #[must_use]
    pub fn with_config(heap: A, config: LedgerConfig) -> Self {
        Self {
            heap,
            config: LedgerConfig {
                initial_capacity: config.initial_capacity.max(1),
                ..config
            },
            table: Mutex::new(None),
            metrics: RegistryMetrics::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> LedgerConfig {
        self.config
    }

    /// The raw allocator beneath the registry.
    #[must_use]
    pub fn heap(&self) -> &A {
        &self.heap
    }

    #[must_use]
    pub fn metrics(&self) -> &RegistryMetrics {
        &self.metrics
    }

    /// Allocate the record table. Must precede every other operation.
    pub fn initialize(&self) -> Result<(), RegistryError> {
        let mut guard = self.table.lock();
        if guard.is_some() {
            return Err(RegistryError::AlreadyInitialized);
        }
        let capacity = self.config.initial_capacity;
        let table = RecordTable::allocate(&self.heap, capacity)
            .ok_or(RegistryError::TableAllocation { capacity })?;
        *guard = Some(table);
        Ok(())
    }

    /// Release every tracked allocation and the table itself.
    ///
    /// The registry returns to the uninitialized state and may be initialized
    /// again. With leak reporting on, every released record is listed in the
    /// report.
    pub fn teardown(&self) -> SweepReport {
        let mut guard = self.table.lock();
        match guard.take() {
            Some(table) => self.sweep(table, None),
            None => SweepReport::default(),
        }
    }

    /// [`teardown`](Self::teardown), also writing each leak to `writer` as a
    /// JSONL line before its block is released.
    ///
    /// Nothing is written when leak reporting is off. A failed write does not
    /// stop the sweep.
    pub fn teardown_to<W: Write>(&self, mut writer: W) -> SweepReport {
        let mut guard = self.table.lock();
        let report = match guard.take() {
            Some(table) => self.sweep(table, Some(&mut writer as &mut dyn Write)),
            None => SweepReport::default(),
        };
        let _ = writer.flush();
        report
    }

    /// Allocate `length * element_size` bytes and record the block.
    ///
    /// Returns `None` for a zero (or overflowing) byte count, when the raw
    /// allocation fails, or when the table cannot be resized. A failed insert leaves
    /// the registry exactly as it was.
    pub fn insert(&self, length: usize, element_size: usize, zeroed: bool) -> Option<NonNull<u8>> {
        let Some(size) = length.checked_mul(element_size) else {
            RegistryMetrics::inc(&self.metrics.alloc_failures);
            return None;
        };
        if size == 0 {
            RegistryMetrics::inc(&self.metrics.zero_length_requests);
            return None;
        }
        let mut guard = self.table.lock();
        let table = self.live_table(&mut guard)?;
        self.insert_locked(table, size, zeroed)
    }

    /// Uninitialized allocation of `size` bytes.
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.insert(size, 1, false)
    }

    /// Zero-filled allocation of `length` elements of `element_size` bytes.
    pub fn allocate_zeroed(&self, length: usize, element_size: usize) -> Option<NonNull<u8>> {
        self.insert(length, element_size, true)
    }

    /// Resize the tracked block at `address` to `new_length` bytes.
    ///
    /// An untracked (or null) `address` is served as a fresh uninitialized
    /// allocation of `new_length` bytes. A zero `new_length` always fails.
    /// When the raw resize fails the old record stays valid and tracked.
    pub fn resize(&self, address: *mut u8, new_length: usize) -> Option<NonNull<u8>> {
        if new_length == 0 {
            RegistryMetrics::inc(&self.metrics.zero_length_requests);
            return None;
        }
        let mut guard = self.table.lock();
        let table = self.live_table(&mut guard)?;

        let Some(index) = table.position(address.addr()) else {
            RegistryMetrics::inc(&self.metrics.resize_fallbacks);
            return self.insert_locked(table, new_length, false);
        };
        let old = table.get(index)?.as_ptr()?;

        // SAFETY: live records hold blocks obtained from `heap` and not yet released.
        match unsafe { self.heap.resize(old, new_length) } {
            Some(moved) => {
                table.set(index, AllocationRecord::new(moved, new_length));
                RegistryMetrics::inc(&self.metrics.resizes);
                Some(moved)
            }
            None => {
                RegistryMetrics::inc(&self.metrics.alloc_failures);
                None
            }
        }
    }

    /// Release the tracked block at `address`.
    ///
    /// Null and untracked addresses are ignored. Returns true if a block was
    /// released.
    pub fn remove(&self, address: *mut u8) -> bool {
        if address.is_null() {
            return false;
        }
        let mut guard = self.table.lock();
        let Some(table) = self.live_table(&mut guard) else {
            return false;
        };
        let Some(index) = table.position(address.addr()) else {
            RegistryMetrics::inc(&self.metrics.untracked_removes);
            return false;
        };

        let record = table.remove_at(index);
        if let Some(ptr) = record.as_ptr() {
            // SAFETY: the record was live, so `ptr` is an unreleased block from `heap`.
            unsafe { self.heap.release(ptr) };
        }
        RegistryMetrics::inc(&self.metrics.removes);
        true
    }

    /// Size of the tracked block at `address`, or 0 if untracked.
    #[must_use]
    pub fn size_of(&self, address: *const u8) -> usize {
        let mut guard = self.table.lock();
        let Some(table) = self.live_table(&mut guard) else {
            return 0;
        };
        table
            .position(address.addr())
            .and_then(|index| table.get(index))
            .map_or(0, |record| record.size)
    }

    /// Number of tracked allocations.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.table.lock().as_ref().map_or(0, RecordTable::len)
    }

    /// Current table capacity in records (0 when uninitialized).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.table.lock().as_ref().map_or(0, RecordTable::capacity)
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.table.lock().is_some()
    }

    /// Sum of all tracked sizes.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.table.lock().as_ref().map_or(0, |table| {
            table
                .live()
                .iter()
                .fold(0_usize, |acc, rec| acc.saturating_add(rec.size))
        })
    }

    /// Copy of every live record, in table order.
    #[must_use]
    pub fn live_allocations(&self) -> Vec<AllocationRecord> {
        self.table
            .lock()
            .as_ref()
            .map_or_else(Vec::new, |table| table.live().to_vec())
    }

    fn live_table<'g>(&self, slot: &'g mut Option<RecordTable>) -> Option<&'g mut RecordTable> {
        if slot.is_none() {
            RegistryMetrics::inc(&self.metrics.uninitialized_calls);
        }
        slot.as_mut()
    }

    fn insert_locked(
        &self,
        table: &mut RecordTable,
        size: usize,
        zeroed: bool,
    ) -> Option<NonNull<u8>> {
        let Some(ptr) = self.heap.alloc(size, zeroed) else {
            RegistryMetrics::inc(&self.metrics.alloc_failures);
            return None;
        };
        if !self.rebalance(table) {
            // SAFETY: `ptr` was just obtained from `heap` and is recorded nowhere.
            unsafe { self.heap.release(ptr) };
            RegistryMetrics::inc(&self.metrics.alloc_failures);
            return None;
        }
        table.push(AllocationRecord::new(ptr, size));
        RegistryMetrics::inc(&self.metrics.inserts);
        Some(ptr)
    }

    /// Apply the growth/shrink policy. False when the new table could not be
    /// allocated; the old table is then left untouched.
    fn rebalance(&self, table: &mut RecordTable) -> bool {
        let (target, counter) =
            match plan_resize(table.len(), table.capacity(), self.config.initial_capacity) {
                TableResize::Keep => return true,
                TableResize::Grow(target) => (target, &self.metrics.table_grows),
                TableResize::Shrink(target) => (target, &self.metrics.table_shrinks),
            };
        let Some(next) = table.migrate(&self.heap, target) else {
            return false;
        };
        std::mem::replace(table, next).release(&self.heap);
        RegistryMetrics::inc(counter);
        true
    }

    fn sweep(&self, table: RecordTable, mut writer: Option<&mut dyn Write>) -> SweepReport {
        let listing = self.config.leak_reporting.enabled();
        let mut report = SweepReport::default();
        for record in table.live() {
            if listing {
                let leak = LeakRecord::from(*record);
                if let Some(out) = writer.as_deref_mut() {
                    let _ = write_leak_line(&leak, out);
                }
                report.leaks.push(leak);
            }
            if let Some(ptr) = record.as_ptr() {
                // SAFETY: live records hold unreleased blocks from `heap`.
                unsafe { self.heap.release(ptr) };
            }
            report.released += 1;
            report.released_bytes = report.released_bytes.saturating_add(record.size);
        }
        RegistryMetrics::add(&self.metrics.leaks_swept, report.released as u64);
        table.release(&self.heap);
        report
    }
}

/// Dropping an initialized registry sweeps it. With leak reporting on, each
/// leak goes to stderr as a JSONL line before its block is released.
impl<A: RawAllocator> Drop for Registry<A> {
    fn drop(&mut self) {
        if let Some(table) = self.table.get_mut().take() {
            let mut stderr = std::io::stderr().lock();
            self.sweep(table, Some(&mut stderr as &mut dyn Write));
        }
    }
}

impl<A: RawAllocator> std::fmt::Debug for Registry<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.table.lock();
        f.debug_struct("Registry")
            .field("initialized", &guard.is_some())
            .field("live_count", &guard.as_ref().map_or(0, RecordTable::len))
            .field("capacity", &guard.as_ref().map_or(0, RecordTable::capacity))
            .field("config", &self.config)
            .finish()
    }
}
