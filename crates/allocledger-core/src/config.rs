//! Runtime configuration.
//!
//! Leak reporting is controlled by the `ALLOCLEDGER_LEAK_REPORT` environment
//! variable:
//! - `on` / `report` / `1` / `true` / `yes`: teardown lists every record still
//!   tracked at sweep time.
//! - `off` / `none` / `0` / `false` / `no`: teardown releases silently.
//!
//! Unset or unrecognized values fall back to the build default, which is `on`
//! when the crate is compiled with the `leak-report` feature and `off` otherwise.

use std::sync::atomic::{AtomicU8, Ordering};

/// Default number of record slots, also the floor the table never shrinks to.
pub const DEFAULT_CAPACITY: usize = 32;

/// Environment variable read by [`leak_reporting`].
pub const LEAK_REPORT_ENV: &str = "ALLOCLEDGER_LEAK_REPORT";

/// Whether teardown reports leaked allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeakReporting {
    /// Still-tracked allocations are listed before release.
    On,
    /// Still-tracked allocations are released silently.
    Off,
}

impl Default for LeakReporting {
    fn default() -> Self {
        Self::build_default()
    }
}

impl LeakReporting {
    /// Default selected by the `leak-report` cargo feature.
    #[must_use]
    pub const fn build_default() -> Self {
        if cfg!(feature = "leak-report") {
            Self::On
        } else {
            Self::Off
        }
    }

    /// Parse from string (case-insensitive); `None` when unrecognized.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" | "report" | "1" | "true" | "yes" => Some(Self::On),
            "off" | "none" | "0" | "false" | "no" => Some(Self::Off),
            _ => None,
        }
    }

    /// Parse from string, falling back to the build default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(Self::build_default)
    }

    #[must_use]
    pub const fn enabled(self) -> bool {
        matches!(self, Self::On)
    }
}

/// Registry construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Slots allocated by `initialize`; also the shrink floor.
    pub initial_capacity: usize,
    /// Leak listing at teardown.
    pub leak_reporting: LeakReporting,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            leak_reporting: LeakReporting::build_default(),
        }
    }
}

impl LedgerConfig {
    /// Defaults, with leak reporting taken from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            leak_reporting: leak_reporting(),
            ..Self::default()
        }
    }

    /// Set the initial capacity (clamped to at least one slot).
    #[must_use]
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_leak_reporting(mut self, reporting: LeakReporting) -> Self {
        self.leak_reporting = reporting;
        self
    }
}

// Atomic cache: 0=unresolved, 1=On, 2=Off, 255=resolving.
// A non-blocking state machine instead of OnceLock so a reentrant call from
// inside the C surface can never wait on itself.
static CACHED_REPORTING: AtomicU8 = AtomicU8::new(0);

const REPORTING_UNRESOLVED: u8 = 0;
const REPORTING_ON: u8 = 1;
const REPORTING_OFF: u8 = 2;
const REPORTING_RESOLVING: u8 = 255;

fn reporting_to_u8(reporting: LeakReporting) -> u8 {
    match reporting {
        LeakReporting::On => REPORTING_ON,
        LeakReporting::Off => REPORTING_OFF,
    }
}

/// Configured leak reporting (reads the env var on first call, caches thereafter).
///
/// A call that races the first resolution gets the build default.
#[must_use]
pub fn leak_reporting() -> LeakReporting {
    match CACHED_REPORTING.load(Ordering::Relaxed) {
        REPORTING_ON => return LeakReporting::On,
        REPORTING_OFF => return LeakReporting::Off,
        REPORTING_RESOLVING => return LeakReporting::build_default(),
        _ => {}
    }

    if CACHED_REPORTING
        .compare_exchange(
            REPORTING_UNRESOLVED,
            REPORTING_RESOLVING,
            Ordering::SeqCst,
            Ordering::Relaxed,
        )
        .is_err()
    {
        return LeakReporting::build_default();
    }

    let resolved = std::env::var(LEAK_REPORT_ENV)
        .map(|v| LeakReporting::from_str_loose(&v))
        .unwrap_or_default();
    CACHED_REPORTING.store(reporting_to_u8(resolved), Ordering::Release);
    resolved
}
