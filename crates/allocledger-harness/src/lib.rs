//! Verification harness for allocledger.
//!
//! This crate provides:
//! - Scenarios: scripted registry checks against a fault-injecting heap
//! - Stress: N threads inserting into one shared registry
//! - Leak sweep: deliberate leaks reported by teardown
//! - Structured JSONL logging for every run

#![forbid(unsafe_code)]

pub mod error;
pub mod scenarios;
pub mod stress;
pub mod structured_log;
pub mod sweep;

pub use error::HarnessError;
pub use scenarios::{CheckResult, ScenarioReport, run_scenarios};
pub use stress::{StressConfig, StressReport, run_stress};
pub use structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};
pub use sweep::run_leak_sweep;
