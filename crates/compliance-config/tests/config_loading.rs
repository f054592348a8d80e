//! File loading and collaborator construction tests for compliance-config.
// crates/compliance-config/tests/config_loading.rs
// =============================================================================
// Module: Config Loading Tests
// Description: Load configs from disk and build runtime collaborators.
// Purpose: Ensure file limits hold and configured policies reach the runtime.
// =============================================================================

use std::fs;
use std::sync::Arc;

use compliance_config::ComplianceConfig;
use compliance_config::ComplianceStores;
use compliance_core::ManualClock;
use compliance_core::NoopTelemetrySink;
use compliance_core::SignatureStore;
use compliance_core::Timestamp;
use tempfile::TempDir;

mod common;

use common::TestResult;
use common::assert_invalid;

#[test]
fn loads_explicit_path() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("compliance.toml");
    fs::write(
        &path,
        "[throttle.login]\nmax_attempts = 2\nwindow_ms = 60000\nblock_duration_ms = 60000\n",
    )
    .map_err(|err| err.to_string())?;
    let config = ComplianceConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.throttle.login.max_attempts != 2 {
        return Err("login override not loaded".to_string());
    }
    Ok(())
}

#[test]
fn missing_file_is_io_error() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    assert_invalid(
        ComplianceConfig::load(Some(&dir.path().join("absent.toml"))),
        "config io error",
    )
}

#[test]
fn oversized_file_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("big.toml");
    let padding = format!("# {}\n", "x".repeat(1024 * 1024));
    fs::write(&path, padding).map_err(|err| err.to_string())?;
    assert_invalid(ComplianceConfig::load(Some(&path)), "config file exceeds size limit")
}

#[test]
fn non_utf8_file_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("binary.toml");
    fs::write(&path, [0xff, 0xfe, 0x00]).map_err(|err| err.to_string())?;
    assert_invalid(ComplianceConfig::load(Some(&path)), "config file must be utf-8")
}

#[test]
fn configured_login_policy_drives_throttle() -> TestResult {
    let config = ComplianceConfig::from_toml(
        "[throttle.login]\nmax_attempts = 2\nwindow_ms = 60000\nblock_duration_ms = 120000\n",
    )
    .map_err(|err| err.to_string())?;
    let stores = ComplianceStores::open(&config.store).map_err(|err| err.to_string())?;
    let clock = ManualClock::new(Timestamp::from_unix_millis(1_700_000_000_000));
    let throttles = config.auth_throttles(
        Arc::clone(&stores.throttle),
        Arc::new(clock),
        Arc::new(NoopTelemetrySink),
    );
    let first = throttles.login.record_attempt("user@example.com").map_err(|e| e.to_string())?;
    let second = throttles.login.record_attempt("user@example.com").map_err(|e| e.to_string())?;
    if first.blocked || !second.blocked {
        return Err("login should block on the second attempt".to_string());
    }
    let signup = throttles.signup.record_attempt("user@example.com").map_err(|e| e.to_string())?;
    if signup.blocked {
        return Err("signup must not share the login entry".to_string());
    }
    Ok(())
}

#[test]
fn sqlite_backend_opens_from_config() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let db = dir.path().join("store").join("compliance.db");
    let config = ComplianceConfig::from_toml(&format!(
        "[store]\ntype = \"sqlite\"\npath = '{}'\n",
        db.display()
    ))
    .map_err(|err| err.to_string())?;
    let stores = ComplianceStores::open(&config.store).map_err(|err| err.to_string())?;
    let stats = stores.signatures.statistics().map_err(|err| err.to_string())?;
    if stats.total != 0 || !db.exists() {
        return Err("expected an empty sqlite database on disk".to_string());
    }
    Ok(())
}

#[test]
fn file_telemetry_sink_is_built() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let log = dir.path().join("events.log");
    let config = ComplianceConfig::from_toml(&format!(
        "[telemetry]\nsink = \"file\"\npath = '{}'\n",
        log.display()
    ))
    .map_err(|err| err.to_string())?;
    config.telemetry.build_sink().map_err(|err| err.to_string())?;
    if !log.exists() {
        return Err("file sink should create the log file".to_string());
    }
    Ok(())
}
