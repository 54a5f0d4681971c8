//! End-to-end runs of the `harness` binary.

use std::process::Command;

#[test]
fn scenario_command_passes_and_prints_summary() {
    let output = Command::new(env!("CARGO_BIN_EXE_harness"))
        .arg("scenario")
        .output()
        .expect("harness scenario should execute");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "scenario failed:\n{stderr}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let summary: serde_json::Value =
        serde_json::from_str(&stdout).expect("CLI should emit JSON summary");
    assert_eq!(summary["failed"].as_u64(), Some(0));
    assert_eq!(summary["total"], summary["passed"]);
    let checks = summary["checks"].as_array().expect("checks array");
    assert!(
        checks
            .iter()
            .any(|c| c["name"].as_str() == Some("example_sequence"))
    );
}

#[test]
fn stress_command_reports_exact_live_count() {
    let output = Command::new(env!("CARGO_BIN_EXE_harness"))
        .args(["stress", "--threads", "4", "--per-thread", "200"])
        .output()
        .expect("harness stress should execute");

    assert!(
        output.status.success(),
        "stress failed:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stress JSON report");
    assert_eq!(report["live_count"].as_u64(), Some(800));
    assert_eq!(report["mismatches"].as_u64(), Some(0));
    assert_eq!(report["passed"].as_bool(), Some(true));
}

#[test]
fn leak_sweep_prints_one_line_per_leak() {
    let output = Command::new(env!("CARGO_BIN_EXE_harness"))
        .args(["leak-sweep", "--leaks", "5", "--size", "24"])
        .output()
        .expect("harness leak-sweep should execute");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("JSONL leak line"))
        .collect();
    assert_eq!(lines.len(), 5);
    for line in &lines {
        assert_eq!(line["event"].as_str(), Some("leak"));
        assert_eq!(line["size"].as_u64(), Some(24));
        assert!(line["address"].as_str().is_some_and(|a| a.starts_with("0x")));
    }
}

#[test]
fn stress_rejects_zero_threads() {
    let output = Command::new(env!("CARGO_BIN_EXE_harness"))
        .args(["stress", "--threads", "0"])
        .output()
        .expect("harness stress should execute");
    assert!(!output.status.success());
}
