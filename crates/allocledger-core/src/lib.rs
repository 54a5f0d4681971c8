//! Process-wide allocation registry.
//!
//! A layer above a raw heap allocator that records every live allocation it
//! grants, so that C-style manual-memory code has one place where all live
//! blocks can be enumerated, sized by address, and released in bulk.
//!
//! # Architecture
//!
//! - **Raw allocator** (`raw`): the untracked heap (`libc` by default)
//! - **Record table** (`table`): dense `(address, size)` array with a
//!   doubling/halving capacity policy
//! - **Registry** (`registry`): lock-guarded table plus lifecycle
//!   (initialize, teardown) and the tracked operations
//! - **Leak sweep** (`leak`): what teardown released, optionally per record
//! - **Configuration** (`config`): leak reporting and initial capacity
//! - **Metrics** (`metrics`): atomic counters for observability
//! - **Fault injection** (`fault`): failing allocator for exhaustion testing

pub mod config;
pub mod error;
pub mod fault;
pub mod leak;
pub mod metrics;
pub mod raw;
pub mod registry;
pub mod table;

pub use config::{DEFAULT_CAPACITY, LeakReporting, LedgerConfig};
pub use error::RegistryError;
pub use fault::FaultyAllocator;
pub use leak::{LeakRecord, SweepReport, write_leak_jsonl, write_leak_line};
pub use metrics::{MetricsSnapshot, RegistryMetrics};
pub use raw::{RawAllocator, SystemAllocator};
pub use registry::Registry;
pub use table::{AllocationRecord, TableResize, plan_resize};
