//! Structured log emission and schema validation.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use allocledger_harness::structured_log::{
    LogEmitter, LogEntry, LogLevel, Outcome, validate_log_file, validate_log_line,
};

fn unique_tmp_path(prefix: &str, suffix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after UNIX_EPOCH")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{}-{nanos}{suffix}", std::process::id()))
}

#[test]
fn emitted_file_validates() {
    let path = unique_tmp_path("allocledger-log", ".jsonl");
    {
        let mut log = LogEmitter::to_file(&path, "run-a").expect("create log");
        log.emit(LogLevel::Info, "start").expect("emit");
        log.emit_entry(
            LogEntry::new("", LogLevel::Warn, "scenario_check")
                .with_check("growth_past_bucket")
                .with_outcome(Outcome::Fail)
                .with_registry(33, 64)
                .with_latency_ns(1_200),
        )
        .expect("emit entry");
        log.flush().expect("flush");
    }

    let (lines, errors) = validate_log_file(&path).expect("read log");
    assert_eq!(lines, 2);
    assert!(errors.is_empty(), "{errors:?}");

    let content = std::fs::read_to_string(&path).expect("read back");
    let second = content.lines().nth(1).expect("second line");
    let entry = validate_log_line(second, 2).expect("valid line");
    assert_eq!(entry.trace_id, "allocledger::run-a::002");
    assert_eq!(entry.run_id.as_deref(), Some("run-a"));
    assert_eq!(entry.outcome, Some(Outcome::Fail));
    assert_eq!(entry.live_count, Some(33));
    assert_eq!(entry.capacity, Some(64));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn invalid_lines_are_reported_per_field() {
    let errs = validate_log_line(r#"{"level":"loud","event":"x"}"#, 7).unwrap_err();
    let fields: Vec<_> = errs.iter().map(|e| e.field.as_str()).collect();
    assert!(fields.contains(&"timestamp"));
    assert!(fields.contains(&"trace_id"));
    assert!(fields.contains(&"level"));
    assert!(errs.iter().all(|e| e.line_number == 7));

    let errs = validate_log_line(
        r#"{"timestamp":"t","trace_id":"allocledger::r::001","level":"debug","event":"x"}"#,
        1,
    )
    .unwrap_err();
    assert_eq!(errs[0].field, "level");

    let errs = validate_log_line("not json", 1).unwrap_err();
    assert_eq!(errs[0].field, "<json>");
}

#[test]
fn scenario_run_log_validates() {
    let path = unique_tmp_path("allocledger-scenario", ".jsonl");
    let mut log = LogEmitter::to_file(&path, "scenario-log").expect("create log");
    let report = allocledger_harness::run_scenarios(&mut log).expect("run");
    drop(log);

    let (lines, errors) = validate_log_file(&path).expect("read log");
    assert!(errors.is_empty(), "{errors:?}");
    // start + one per check + end
    assert_eq!(lines, report.total + 2);

    let _ = std::fs::remove_file(&path);
}
