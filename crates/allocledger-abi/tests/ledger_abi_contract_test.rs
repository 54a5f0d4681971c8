//! Integration tests for the `ledger_*` C surface.

use std::ffi::c_void;
use std::sync::Mutex;

use allocledger_abi::{
    global_ledger, ledger_alloc, ledger_allocations, ledger_calloc, ledger_free, ledger_init,
    ledger_length, ledger_malloc, ledger_realloc, ledger_teardown,
};

// The ledger is process-wide; tests take turns with it.
static TEST_LOCK: Mutex<()> = Mutex::new(());

fn fresh_ledger() -> std::sync::MutexGuard<'static, ()> {
    let guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    ledger_teardown();
    assert_eq!(ledger_init(), 0);
    guard
}

#[test]
fn example_sequence_through_c_surface() {
    let _guard = fresh_ledger();

    let p = ledger_alloc(10, 1, 1);
    assert!(!p.is_null());
    assert_eq!(ledger_length(p), 10);

    // SAFETY: `p` is a live ledger block.
    let p2 = unsafe { ledger_realloc(p, 20) };
    assert!(!p2.is_null());
    assert_eq!(ledger_length(p2), 20);
    if p2 != p {
        assert_eq!(ledger_length(p), 0);
    }

    // SAFETY: `p2` is a live ledger block.
    unsafe { ledger_free(p2) };
    assert_eq!(ledger_allocations(), 0);
    assert_eq!(ledger_teardown(), 0);
}

#[test]
fn double_init_fails() {
    let _guard = fresh_ledger();
    assert_eq!(ledger_init(), -1);
    ledger_teardown();
}

#[test]
fn zero_byte_requests_return_null() {
    let _guard = fresh_ledger();
    assert!(ledger_malloc(0, 4).is_null());
    assert!(ledger_calloc(4, 0).is_null());
    let p = ledger_malloc(4, 4);
    // SAFETY: `p` is a live ledger block.
    assert!(unsafe { ledger_realloc(p, 0) }.is_null());
    assert_eq!(ledger_length(p), 16);
    assert_eq!(ledger_allocations(), 1);
    assert_eq!(ledger_teardown(), 1);
}

#[test]
fn calloc_is_zero_filled() {
    let _guard = fresh_ledger();
    let p = ledger_calloc(32, 8);
    assert!(!p.is_null());
    // SAFETY: 256 bytes were granted.
    let bytes = unsafe { std::slice::from_raw_parts(p.cast::<u8>(), 256) };
    assert!(bytes.iter().all(|&b| b == 0));
    ledger_teardown();
}

#[test]
fn free_of_foreign_pointer_is_ignored() {
    let _guard = fresh_ledger();
    let tracked = ledger_malloc(8, 1);

    // SAFETY: libc block owned by this test.
    let foreign = unsafe { libc::malloc(8) };
    // SAFETY: ledger_free ignores untracked pointers.
    unsafe {
        ledger_free(foreign);
        ledger_free(std::ptr::null_mut());
    }
    assert_eq!(ledger_allocations(), 1);
    assert_eq!(ledger_length(tracked), 8);

    // SAFETY: still ours.
    unsafe { libc::free(foreign) };
    ledger_teardown();
}

#[test]
fn realloc_of_null_allocates() {
    let _guard = fresh_ledger();
    // SAFETY: null is accepted.
    let p = unsafe { ledger_realloc(std::ptr::null_mut(), 48) };
    assert!(!p.is_null());
    assert_eq!(ledger_length(p), 48);
    assert_eq!(ledger_allocations(), 1);
    ledger_teardown();
}

#[test]
fn teardown_sweeps_many_leaks() {
    let _guard = fresh_ledger();
    let ptrs: Vec<*mut c_void> = (1..=100).map(|i| ledger_malloc(i, 1)).collect();
    assert!(ptrs.iter().all(|p| !p.is_null()));
    assert_eq!(ledger_allocations(), 100);
    assert!(global_ledger().capacity() >= 100);

    assert_eq!(ledger_teardown(), 100);
    assert_eq!(ledger_allocations(), 0);
    for p in ptrs {
        assert_eq!(ledger_length(p), 0);
    }
}

#[test]
fn calls_after_teardown_return_sentinels() {
    let _guard = fresh_ledger();
    ledger_teardown();
    assert!(ledger_malloc(8, 1).is_null());
    assert_eq!(ledger_allocations(), 0);
    assert_eq!(ledger_teardown(), 0);
}
