//! Dense record table backing the registry.
//!
//! The table is a single raw-allocated array of [`AllocationRecord`] slots.
//! Slots `0..len` are live, slots `len..capacity` hold [`AllocationRecord::EMPTY`].
//! The backing memory is obtained zero-filled, and an all-zero record is the
//! empty record, so every slot is always initialized.

use std::ptr::NonNull;

use crate::raw::RawAllocator;

/// One live tracked allocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationRecord {
    /// Address returned by the raw allocator.
    pub address: usize,
    /// Bytes most recently granted for `address`.
    pub size: usize,
}

impl AllocationRecord {
    /// Unused slot marker.
    pub const EMPTY: Self = Self {
        address: 0,
        size: 0,
    };

    #[must_use]
    pub(crate) fn new(ptr: NonNull<u8>, size: usize) -> Self {
        Self {
            address: ptr.as_ptr().expose_provenance(),
            size,
        }
    }

    /// Returns true for the unused slot marker.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.address == 0
    }

    /// Pointer to the tracked block, `None` for an empty slot.
    #[must_use]
    pub fn as_ptr(self) -> Option<NonNull<u8>> {
        NonNull::new(std::ptr::with_exposed_provenance_mut::<u8>(self.address))
    }
}

/// Resize decision for the table, taken before each insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableResize {
    /// Capacity stays as is.
    Keep,
    /// Table is full; migrate to the given capacity.
    Grow(usize),
    /// Table is under half full; migrate to the given smaller capacity.
    Shrink(usize),
}

/// Growth/shrink policy.
///
/// Full tables double. Tables under half full halve, but never to `floor`
/// or below: a shrink happens only when the halved capacity is strictly
/// greater than `floor`.
#[must_use]
pub fn plan_resize(count: usize, capacity: usize, floor: usize) -> TableResize {
    if count >= capacity {
        return TableResize::Grow(capacity.saturating_mul(2).max(1));
    }
    let half = capacity / 2;
    if count < half {
        let target = half.max(floor);
        if target > floor {
            return TableResize::Shrink(target);
        }
    }
    TableResize::Keep
}

/// Raw-allocated array of allocation records.
#[derive(Debug)]
pub(crate) struct RecordTable {
    slots: NonNull<AllocationRecord>,
    capacity: usize,
    len: usize,
}

// SAFETY: the table exclusively owns its slot array; records are plain data.
unsafe impl Send for RecordTable {}

impl RecordTable {
    /// Allocate an empty table with room for `capacity` records.
    pub(crate) fn allocate<A: RawAllocator>(heap: &A, capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        let bytes = capacity.checked_mul(size_of::<AllocationRecord>())?;
        let slots = heap.alloc(bytes, true)?.cast::<AllocationRecord>();
        debug_assert_eq!(
            slots.as_ptr() as usize % align_of::<AllocationRecord>(),
            0,
            "raw allocator returned a misaligned table"
        );
        Some(Self {
            slots,
            capacity,
            len: 0,
        })
    }

    /// Build a table of `new_capacity` slots holding a copy of every live record.
    ///
    /// `self` is untouched; on failure `None` is returned.
    pub(crate) fn migrate<A: RawAllocator>(&self, heap: &A, new_capacity: usize) -> Option<Self> {
        if new_capacity < self.len {
            return None;
        }
        let mut next = Self::allocate(heap, new_capacity)?;
        next.all_slots_mut()[..self.len].copy_from_slice(self.live());
        next.len = self.len;
        Some(next)
    }

    /// Return the slot array to the heap. Tracked blocks are not touched.
    pub(crate) fn release<A: RawAllocator>(self, heap: &A) {
        // SAFETY: `slots` came from `heap.alloc` in `allocate` and is released once.
        unsafe { heap.release(self.slots.cast::<u8>()) };
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live records in slot order.
    #[must_use]
    pub(crate) fn live(&self) -> &[AllocationRecord] {
        &self.all_slots()[..self.len]
    }

    /// Slot index of the live record for `address`.
    #[must_use]
    pub(crate) fn position(&self, address: usize) -> Option<usize> {
        if address == 0 {
            return None;
        }
        self.live().iter().position(|rec| rec.address == address)
    }

    #[must_use]
    pub(crate) fn get(&self, index: usize) -> Option<AllocationRecord> {
        self.live().get(index).copied()
    }

    /// Overwrite the live record at `index`.
    pub(crate) fn set(&mut self, index: usize, record: AllocationRecord) {
        let len = self.len;
        self.all_slots_mut()[..len][index] = record;
    }

    /// Append a record. The caller must have made room first.
    pub(crate) fn push(&mut self, record: AllocationRecord) {
        assert!(self.len < self.capacity, "record table is full");
        let len = self.len;
        self.all_slots_mut()[len] = record;
        self.len += 1;
    }

    /// Remove the record at `index`, shifting later records down one slot.
    pub(crate) fn remove_at(&mut self, index: usize) -> AllocationRecord {
        let len = self.len;
        let slots = self.all_slots_mut();
        let removed = slots[..len][index];
        slots.copy_within(index + 1..len, index);
        slots[len - 1] = AllocationRecord::EMPTY;
        self.len -= 1;
        removed
    }

    fn all_slots(&self) -> &[AllocationRecord] {
        // SAFETY: `slots` points to `capacity` initialized records (zero-filled
        // on allocation) owned by this table.
        unsafe { std::slice::from_raw_parts(self.slots.as_ptr(), self.capacity) }
    }

    fn all_slots_mut(&mut self) -> &mut [AllocationRecord] {
        // SAFETY: as in `all_slots`; `&mut self` gives exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.slots.as_ptr(), self.capacity) }
    }
}
