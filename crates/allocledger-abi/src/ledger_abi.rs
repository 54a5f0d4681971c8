//! C entry points for the allocation ledger.
//!
//! Every function forwards to the process-wide registry. Failures are reported
//! the C way: null pointers, zero lengths and `-1` status codes.

use std::ffi::{c_int, c_void};
use std::ptr;

use crate::ledger_state::global_ledger;

// ---------------------------------------------------------------------------
// lifecycle
// ---------------------------------------------------------------------------

/// Initialize the ledger. Must be called once before any other `ledger_*` call.
///
/// Returns 0 on success and -1 if the ledger is already initialized or its
/// table could not be allocated.
#[unsafe(no_mangle)]
pub extern "C" fn ledger_init() -> c_int {
    match global_ledger().initialize() {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Release every tracked allocation and the ledger's own table.
///
/// With leak reporting on, every allocation still tracked is written to
/// stderr as one JSON line just before its block is released. Returns how many tracked
/// allocations were released. `ledger_init` may be called again afterwards.
#[unsafe(no_mangle)]
pub extern "C" fn ledger_teardown() -> usize {
    global_ledger()
        .teardown_to(std::io::stderr().lock())
        .released
}

// ---------------------------------------------------------------------------
// allocation
// ---------------------------------------------------------------------------

/// Allocate `length * elem_size` tracked bytes, zero-filled when `zeroed != 0`.
///
/// Returns null for a zero byte count or when allocation fails.
#[unsafe(no_mangle)]
pub extern "C" fn ledger_alloc(length: usize, elem_size: usize, zeroed: c_int) -> *mut c_void {
    global_ledger()
        .insert(length, elem_size, zeroed != 0)
        .map_or(ptr::null_mut(), |p| p.as_ptr().cast())
}

/// Uninitialized tracked allocation of `length * elem_size` bytes.
#[unsafe(no_mangle)]
pub extern "C" fn ledger_malloc(length: usize, elem_size: usize) -> *mut c_void {
    ledger_alloc(length, elem_size, 0)
}

/// Zero-filled tracked allocation of `length * elem_size` bytes.
#[unsafe(no_mangle)]
pub extern "C" fn ledger_calloc(length: usize, elem_size: usize) -> *mut c_void {
    ledger_alloc(length, elem_size, 1)
}

/// Resize a tracked allocation to `length` bytes.
///
/// An untracked (or null) `ptr` gets a fresh uninitialized allocation. A zero
/// `length` always returns null. On failure the old block stays valid.
///
/// # Safety
///
/// `ptr` must be null, untracked, or a live block returned by this ledger.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ledger_realloc(ptr: *mut c_void, length: usize) -> *mut c_void {
    global_ledger()
        .resize(ptr.cast(), length)
        .map_or(ptr::null_mut(), |p| p.as_ptr().cast())
}

/// Release a tracked allocation. Null and untracked pointers are ignored.
///
/// # Safety
///
/// `ptr` must not be used after this call if it was tracked.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ledger_free(ptr: *mut c_void) {
    global_ledger().remove(ptr.cast());
}

// ---------------------------------------------------------------------------
// queries
// ---------------------------------------------------------------------------

/// Byte length of a tracked allocation, 0 if untracked.
#[unsafe(no_mangle)]
pub extern "C" fn ledger_length(ptr: *const c_void) -> usize {
    global_ledger().size_of(ptr.cast())
}

/// Number of tracked allocations.
#[unsafe(no_mangle)]
pub extern "C" fn ledger_allocations() -> usize {
    global_ledger().live_count()
}
