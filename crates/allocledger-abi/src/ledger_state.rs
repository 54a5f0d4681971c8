//! The process-wide registry behind the C surface.
//!
//! The registry value is constructed lazily on first touch; it is not usable
//! until `ledger_init` has allocated its table, and `ledger_teardown` puts it
//! back in that state.

use std::sync::OnceLock;

use allocledger_core::{Registry, SystemAllocator};

static GLOBAL_LEDGER: OnceLock<Registry<SystemAllocator>> = OnceLock::new();

/// Global ledger instance.
#[must_use]
pub fn global_ledger() -> &'static Registry<SystemAllocator> {
    GLOBAL_LEDGER.get_or_init(Registry::system)
}
