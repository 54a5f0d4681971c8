//! # allocledger-abi
//!
//! `extern "C"` boundary for the allocation ledger.
//!
//! This crate produces a `cdylib` exposing the `ledger_*` symbols declared in
//! `include/allocledger.h`. Every symbol forwards to one process-wide
//! [`allocledger_core::Registry`] over the C heap.
//!
//! ```text
//! C caller -> ledger_* (this crate) -> Registry (lock) -> libc heap
//! ```
//!
//! Build with the `leak-report` feature (or set `ALLOCLEDGER_LEAK_REPORT=on`)
//! to have `ledger_teardown` list every leaked block on stderr.

pub mod ledger_abi;
mod ledger_state;

pub use ledger_abi::{
    ledger_alloc, ledger_allocations, ledger_calloc, ledger_free, ledger_init, ledger_length,
    ledger_malloc, ledger_realloc, ledger_teardown,
};
pub use ledger_state::global_ledger;
