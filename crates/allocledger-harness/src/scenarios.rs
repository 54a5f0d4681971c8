//! Scripted behavior checks against a fault-injecting registry.
//!
//! Each check gets a freshly initialized `Registry<FaultyAllocator>`. After the
//! check body returns, the registry is torn down and the allocator must report
//! zero outstanding blocks; a check that passes but leaks still fails.

use std::time::Instant;

use allocledger_core::{DEFAULT_CAPACITY, FaultyAllocator, LeakReporting, LedgerConfig, Registry};
use serde::Serialize;

use crate::error::HarnessError;
use crate::stress::{StressConfig, run_stress};
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

type Ledger = Registry<FaultyAllocator>;
type CheckFn = fn(&Ledger) -> Result<String, String>;

const CHECKS: &[(&str, CheckFn)] = &[
    ("example_sequence", example_sequence),
    ("size_matches_request", size_matches_request),
    ("remove_forgets", remove_forgets),
    ("resize_reports_new_size", resize_reports_new_size),
    ("zero_length_is_noop", zero_length_is_noop),
    ("growth_past_bucket", growth_past_bucket),
    ("shrink_respects_floor", shrink_respects_floor),
    ("teardown_forgets", teardown_forgets),
    ("exhaustion_preserves_state", exhaustion_preserves_state),
    ("untracked_remove_is_noop", untracked_remove_is_noop),
    ("concurrent_inserts", concurrent_inserts),
];

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
    pub latency_ns: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub run_id: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub checks: Vec<CheckResult>,
}

impl ScenarioReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Names of every scripted check, in run order.
#[must_use]
pub fn check_names() -> Vec<&'static str> {
    CHECKS.iter().map(|(name, _)| *name).collect()
}

/// Run every check, logging one entry per check plus a summary entry.
pub fn run_scenarios(log: &mut LogEmitter) -> Result<ScenarioReport, HarnessError> {
    log.emit(LogLevel::Info, "scenario_run_start")?;

    let mut checks = Vec::with_capacity(CHECKS.len());
    for &(name, check) in CHECKS {
        let registry = Registry::with_config(
            FaultyAllocator::default(),
            LedgerConfig::default().with_leak_reporting(LeakReporting::Off),
        );
        registry.initialize()?;

        let started = Instant::now();
        let mut result = check(&registry);
        let latency_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        let (live_count, capacity) = (registry.live_count(), registry.capacity());

        registry.heap().heal();
        registry.teardown();
        let outstanding = registry.heap().outstanding();
        if outstanding != 0 && result.is_ok() {
            result = Err(format!("{outstanding} blocks outstanding after teardown"));
        }

        let passed = result.is_ok();
        let detail = result.unwrap_or_else(|err| err);
        let level = if passed { LogLevel::Info } else { LogLevel::Error };
        log.emit_entry(
            LogEntry::new("", level, "scenario_check")
                .with_check(name)
                .with_outcome(Outcome::from_passed(passed))
                .with_registry(live_count, capacity)
                .with_latency_ns(latency_ns)
                .with_details(serde_json::json!({ "detail": detail })),
        )?;

        checks.push(CheckResult {
            name: name.to_string(),
            passed,
            detail,
            latency_ns,
        });
    }

    let passed = checks.iter().filter(|c| c.passed).count();
    let report = ScenarioReport {
        run_id: log.run_id().to_string(),
        total: checks.len(),
        passed,
        failed: checks.len() - passed,
        checks,
    };
    log.emit_entry(
        LogEntry::new("", LogLevel::Info, "scenario_run_end")
            .with_outcome(Outcome::from_passed(report.all_passed()))
            .with_details(serde_json::json!({
                "total": report.total,
                "passed": report.passed,
                "failed": report.failed,
            })),
    )?;
    log.flush()?;
    Ok(report)
}

fn ensure(cond: bool, msg: impl FnOnce() -> String) -> Result<(), String> {
    if cond { Ok(()) } else { Err(msg()) }
}

fn example_sequence(ledger: &Ledger) -> Result<String, String> {
    let p = ledger.insert(10, 1, true).ok_or("insert(10, 1) failed")?;
    ensure(ledger.size_of(p.as_ptr()) == 10, || "size_of(p) != 10".into())?;

    let p2 = ledger.resize(p.as_ptr(), 20).ok_or("resize to 20 failed")?;
    ensure(ledger.size_of(p2.as_ptr()) == 20, || "size_of(p2) != 20".into())?;
    if p2 != p {
        ensure(ledger.size_of(p.as_ptr()) == 0, || {
            "moved block still tracked at old address".into()
        })?;
    }

    ensure(ledger.remove(p2.as_ptr()), || "remove(p2) found nothing".into())?;
    ensure(ledger.live_count() == 0, || {
        format!("live_count {} after remove", ledger.live_count())
    })?;
    Ok(format!("block moved on resize: {}", p2 != p))
}

fn size_matches_request(ledger: &Ledger) -> Result<String, String> {
    let requests = [(1, 1), (7, 3), (100, 8), (4096, 1), (3, 1000)];
    let mut granted = Vec::with_capacity(requests.len());
    for (len, elem) in requests {
        let p = ledger
            .insert(len, elem, false)
            .ok_or_else(|| format!("insert({len}, {elem}) failed"))?;
        granted.push((p, len * elem));
    }
    for (p, bytes) in &granted {
        let got = ledger.size_of(p.as_ptr());
        ensure(got == *bytes, || format!("size_of = {got}, expected {bytes}"))?;
    }
    let expected: usize = granted.iter().map(|(_, bytes)| bytes).sum();
    ensure(ledger.total_bytes() == expected, || {
        format!("total_bytes {} != {expected}", ledger.total_bytes())
    })?;
    Ok(format!("{} blocks, {expected} bytes", granted.len()))
}

fn remove_forgets(ledger: &Ledger) -> Result<String, String> {
    let a = ledger.allocate(16).ok_or("allocate a failed")?;
    let b = ledger.allocate(32).ok_or("allocate b failed")?;
    ensure(ledger.remove(a.as_ptr()), || "remove(a) found nothing".into())?;
    ensure(ledger.size_of(a.as_ptr()) == 0, || "a still tracked".into())?;
    ensure(ledger.size_of(b.as_ptr()) == 32, || "b lost its size".into())?;
    ensure(!ledger.remove(a.as_ptr()), || "second remove(a) succeeded".into())?;
    Ok("removed block forgotten, neighbor intact".to_string())
}

fn resize_reports_new_size(ledger: &Ledger) -> Result<String, String> {
    let p = ledger.allocate_zeroed(8, 8).ok_or("allocate_zeroed failed")?;
    let grown = ledger.resize(p.as_ptr(), 1024).ok_or("grow failed")?;
    ensure(ledger.size_of(grown.as_ptr()) == 1024, || "grown size wrong".into())?;
    let shrunk = ledger.resize(grown.as_ptr(), 4).ok_or("shrink failed")?;
    ensure(ledger.size_of(shrunk.as_ptr()) == 4, || "shrunk size wrong".into())?;
    ensure(ledger.live_count() == 1, || {
        format!("live_count {} after resizes", ledger.live_count())
    })?;

    ledger.heap().set_fail_resize(true);
    let refused = ledger.resize(shrunk.as_ptr(), 64);
    ledger.heap().set_fail_resize(false);
    ensure(refused.is_none(), || "failed resize returned a block".into())?;
    ensure(ledger.size_of(shrunk.as_ptr()) == 4, || {
        "failed resize disturbed the record".into()
    })?;
    Ok("8x8 -> 1024 -> 4, failed resize kept record".to_string())
}

fn zero_length_is_noop(ledger: &Ledger) -> Result<String, String> {
    let p = ledger.allocate(24).ok_or("allocate failed")?;
    let capacity = ledger.capacity();
    ensure(ledger.insert(0, 8, false).is_none(), || "insert(0, 8) returned a block".into())?;
    ensure(ledger.insert(8, 0, true).is_none(), || "insert(8, 0) returned a block".into())?;
    ensure(ledger.resize(p.as_ptr(), 0).is_none(), || "resize to 0 returned a block".into())?;
    ensure(ledger.size_of(p.as_ptr()) == 24, || "resize to 0 changed the record".into())?;
    ensure(ledger.live_count() == 1 && ledger.capacity() == capacity, || {
        "zero-length requests changed the table".into()
    })?;
    Ok("zero-length insert and resize refused".to_string())
}

fn growth_past_bucket(ledger: &Ledger) -> Result<String, String> {
    for i in 0..=DEFAULT_CAPACITY {
        ledger
            .allocate(i + 1)
            .ok_or_else(|| format!("insert #{i} failed"))?;
    }
    let capacity = ledger.capacity();
    ensure(capacity == DEFAULT_CAPACITY * 2, || {
        format!("capacity {capacity} after {} inserts", DEFAULT_CAPACITY + 1)
    })?;
    ensure(ledger.live_count() == DEFAULT_CAPACITY + 1, || "live count wrong".into())?;
    Ok(format!("capacity {DEFAULT_CAPACITY} -> {capacity}"))
}

fn shrink_respects_floor(ledger: &Ledger) -> Result<String, String> {
    let blocks: Vec<_> = (0..=DEFAULT_CAPACITY * 2)
        .map(|_| ledger.allocate(8))
        .collect::<Option<_>>()
        .ok_or("bulk insert failed")?;
    let peak = ledger.capacity();
    ensure(peak == DEFAULT_CAPACITY * 4, || format!("peak capacity {peak}"))?;

    for p in &blocks[1..] {
        ledger.remove(p.as_ptr());
    }
    ledger.allocate(8).ok_or("insert after removals failed")?;
    let shrunk = ledger.capacity();
    ensure(shrunk == DEFAULT_CAPACITY * 2, || {
        format!("capacity {shrunk} after first shrink")
    })?;

    for _ in 0..4 {
        let p = ledger.allocate(8).ok_or("churn insert failed")?;
        ledger.remove(p.as_ptr());
    }
    let settled = ledger.capacity();
    ensure(settled >= DEFAULT_CAPACITY, || {
        format!("capacity {settled} fell below the floor")
    })?;
    ensure(ledger.size_of(blocks[0].as_ptr()) == 8, || {
        "survivor lost during shrink".into()
    })?;
    Ok(format!("capacity {peak} -> {shrunk} -> {settled}"))
}

fn teardown_forgets(ledger: &Ledger) -> Result<String, String> {
    let blocks: Vec<_> = (1..=10)
        .map(|n| ledger.allocate(n))
        .collect::<Option<_>>()
        .ok_or("insert failed")?;
    let report = ledger.teardown();
    ensure(report.released == 10, || {
        format!("teardown released {}", report.released)
    })?;
    ensure(!ledger.is_initialized(), || "still initialized".into())?;
    ensure(ledger.size_of(blocks[0].as_ptr()) == 0, || {
        "size_of answered after teardown".into()
    })?;

    ledger.initialize().map_err(|err| err.to_string())?;
    ensure(ledger.live_count() == 0, || "reinitialized registry not empty".into())?;
    ensure(ledger.capacity() == DEFAULT_CAPACITY, || {
        format!("reinitialized capacity {}", ledger.capacity())
    })?;
    Ok(format!("swept {} bytes", report.released_bytes))
}

fn exhaustion_preserves_state(ledger: &Ledger) -> Result<String, String> {
    for _ in 0..DEFAULT_CAPACITY {
        ledger.allocate(4).ok_or("fill insert failed")?;
    }
    let (live, capacity, bytes) = (ledger.live_count(), ledger.capacity(), ledger.total_bytes());

    // Raw block succeeds, table growth fails.
    ledger.heap().fail_after(1);
    let refused = ledger.allocate(4);
    ledger.heap().heal();
    ensure(refused.is_none(), || "insert succeeded without table growth".into())?;
    ensure(
        ledger.live_count() == live
            && ledger.capacity() == capacity
            && ledger.total_bytes() == bytes,
        || "failed growth changed the registry".into(),
    )?;

    ledger.heap().fail_allocs();
    let refused = ledger.allocate(4);
    ledger.heap().heal();
    ensure(refused.is_none(), || "insert succeeded with heap exhausted".into())?;
    ensure(ledger.live_count() == live, || "failed raw alloc changed the registry".into())?;

    ledger.allocate(4).ok_or("insert after heal failed")?;
    ensure(ledger.capacity() == capacity * 2, || "no growth after heal".into())?;

    // Drop below half of a doubled table so the next insert must shrink.
    let grown = ledger.capacity();
    let extra: Vec<_> = (0..=grown / 2)
        .map(|_| ledger.allocate(4))
        .collect::<Option<_>>()
        .ok_or("fill for shrink failed")?;
    let peak = ledger.capacity();
    for p in &extra {
        ledger.remove(p.as_ptr());
    }
    let records = ledger.live_allocations();
    let outstanding = ledger.heap().outstanding();

    // Raw block succeeds, table shrink fails.
    ledger.heap().fail_after(1);
    let refused = ledger.allocate(4);
    ledger.heap().heal();
    ensure(refused.is_none(), || "insert succeeded without table shrink".into())?;
    ensure(
        ledger.capacity() == peak
            && ledger.live_allocations() == records
            && ledger.heap().outstanding() == outstanding,
        || "failed shrink changed the registry".into(),
    )?;

    ledger.allocate(4).ok_or("insert after second heal failed")?;
    ensure(ledger.capacity() < peak, || "no shrink after heal".into())?;
    Ok(format!(
        "state held at {live} live / {capacity} slots and at {} live / {peak} slots",
        records.len()
    ))
}

fn untracked_remove_is_noop(ledger: &Ledger) -> Result<String, String> {
    let tracked = ledger.allocate(8).ok_or("allocate failed")?;
    let mut foreign = [0_u8; 8];
    ensure(!ledger.remove(foreign.as_mut_ptr()), || "foreign remove succeeded".into())?;
    ensure(!ledger.remove(std::ptr::null_mut()), || "null remove succeeded".into())?;
    ensure(ledger.live_count() == 1, || "untracked remove changed live count".into())?;
    ensure(ledger.size_of(tracked.as_ptr()) == 8, || "tracked block disturbed".into())?;
    let untracked = ledger.metrics().snapshot().untracked_removes;
    ensure(untracked == 1, || format!("untracked_removes = {untracked}"))?;
    Ok("foreign and null removes ignored".to_string())
}

fn concurrent_inserts(_ledger: &Ledger) -> Result<String, String> {
    let report = run_stress(StressConfig {
        threads: 8,
        per_thread: 250,
        block_size: 16,
    })
    .map_err(|err| err.to_string())?;
    ensure(report.passed, || {
        format!(
            "live {} of {}, {} mismatches, {} failed inserts",
            report.live_count, report.expected, report.mismatches, report.failed_inserts
        )
    })?;
    Ok(format!(
        "{} live in {} slots after {} ms",
        report.live_count, report.capacity, report.elapsed_ms
    ))
}
