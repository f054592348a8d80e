// crates/compliance-core/tests/telemetry.rs
// ============================================================================
// Module: Telemetry Sink Tests
// Description: JSON-line output of the file telemetry sink.
// Purpose: Ensure side-channel events are appended and never truncated.
// ============================================================================

//! ## Overview
//! JSON-line output of the file telemetry sink.
#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use compliance_core::FileTelemetrySink;
use compliance_core::TelemetryEvent;
use compliance_core::TelemetrySink;
use compliance_core::Timestamp;
use compliance_core::runtime::telemetry::EVENT_AUDIT_WRITE_FAILED;
use compliance_core::runtime::telemetry::EVENT_THROTTLE_BLOCKED;
use serde_json::Value;
use tempfile::TempDir;

fn read_lines(path: &std::path::Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn file_sink_writes_one_json_object_per_event() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("telemetry.jsonl");
    let sink = FileTelemetrySink::new(&path).unwrap();

    sink.record(&TelemetryEvent::new(
        EVENT_THROTTLE_BLOCKED,
        Timestamp::from_unix_millis(1_000),
        "attempt_throttle",
        Some("login:alice@example.com".to_string()),
        "blocked after 5 attempts",
    ));
    sink.record(&TelemetryEvent::new(
        EVENT_AUDIT_WRITE_FAILED,
        Timestamp::from_unix_millis(2_000),
        "audit_logger",
        None,
        "audit log store error: disk full",
    ));

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], "throttle_blocked");
    assert_eq!(lines[0]["timestamp_ms"], 1_000);
    assert_eq!(lines[0]["subject"], "login:alice@example.com");
    assert_eq!(lines[1]["event"], "audit_write_failed");
    assert_eq!(lines[1]["component"], "audit_logger");
    assert!(lines[1]["subject"].is_null());
}

#[test]
fn file_sink_appends_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("telemetry.jsonl");
    let event = TelemetryEvent::new(
        EVENT_THROTTLE_BLOCKED,
        Timestamp::from_unix_millis(5),
        "attempt_throttle",
        None,
        "blocked",
    );

    FileTelemetrySink::new(&path).unwrap().record(&event);
    FileTelemetrySink::new(&path).unwrap().record(&event);

    assert_eq!(read_lines(&path).len(), 2);
}

#[test]
fn file_sink_rejects_missing_parent_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing").join("telemetry.jsonl");
    assert!(FileTelemetrySink::new(&path).is_err());
}
