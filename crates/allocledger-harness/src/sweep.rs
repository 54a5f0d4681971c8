//! Deliberate leak sweep: allocate, never free, tear down with reporting on.

use allocledger_core::{LeakReporting, LedgerConfig, Registry, SweepReport, SystemAllocator};

use crate::error::HarnessError;

/// Allocate `leaks` blocks of `size` bytes and return the teardown report.
pub fn run_leak_sweep(leaks: usize, size: usize) -> Result<SweepReport, HarnessError> {
    if size == 0 {
        return Err(HarnessError::InvalidArgument(
            "leak size must be non-zero".to_string(),
        ));
    }

    let registry = Registry::with_config(
        SystemAllocator,
        LedgerConfig::default().with_leak_reporting(LeakReporting::On),
    );
    registry.initialize()?;
    for _ in 0..leaks {
        if registry.allocate(size).is_none() {
            registry.teardown();
            return Err(HarnessError::AllocationFailed { size });
        }
    }

    let report = registry.teardown();
    if report.released != leaks || report.leaks.len() != leaks {
        return Err(HarnessError::CheckFailed {
            failed: leaks.abs_diff(report.leaks.len()).max(1),
            total: leaks,
        });
    }
    Ok(report)
}
