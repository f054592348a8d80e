// crates/compliance-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Tests
// Description: Argument parsing, bounded reads, and command execution.
// Purpose: Ensure commands reach the store and report results as JSON.
// Dependencies: compliance-cli main helpers, tempfile
// ============================================================================

//! ## Overview
//! Parses argument vectors with clap and runs [`super::execute`] against a
//! temporary `SQLite` database described by a temporary config file.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::CommandFactory;
use clap::Parser;
use compliance_config::ComplianceConfig;
use compliance_config::ComplianceStores;
use compliance_core::AuditLogger;
use compliance_core::CompletionSignatureRequest;
use compliance_core::ElectronicSignature;
use compliance_core::EnrollmentId;
use compliance_core::NoClientEnvironment;
use compliance_core::NoopTelemetrySink;
use compliance_core::SignatureService;
use compliance_core::SystemClock;
use compliance_core::UserId;
use compliance_core::core::hashing::DEFAULT_HASH_ALGORITHM;
use compliance_core::core::hashing::hash_bytes;
use serde_json::json;
use tempfile::TempDir;

use super::Cli;
use super::ReadLimitError;
use super::execute;
use super::read_bytes_with_limit;

// ============================================================================
// SECTION: Helpers
// ============================================================================

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

fn workspace() -> Workspace {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("compliance.db");
    let config = dir.path().join("compliance.toml");
    fs::write(
        &config,
        format!(
            "[store]\ntype = \"sqlite\"\npath = '{}'\n\n[telemetry]\nsink = \"none\"\n",
            db.display()
        ),
    )
    .unwrap();
    Workspace {
        dir,
        config,
    }
}

fn seed_signature(ws: &Workspace) -> ElectronicSignature {
    let config = ComplianceConfig::load(Some(&ws.config)).unwrap();
    let stores = ComplianceStores::open(&config.store).unwrap();
    let telemetry = Arc::new(NoopTelemetrySink);
    let audit = AuditLogger::new(stores.audit, Arc::new(SystemClock), telemetry.clone());
    let service = SignatureService::new(
        stores.signatures,
        audit,
        Arc::new(SystemClock),
        Arc::new(NoClientEnvironment),
        telemetry,
    );
    service
        .create_completion_signature(CompletionSignatureRequest {
            enrollment_id: EnrollmentId::from("E1"),
            user_id: UserId::from("U1"),
            course_title: "GMP Fundamentals".to_string(),
            signer_name: "Jane Doe".to_string(),
            signer_title: None,
            signature_image: json!("data:image/png;base64,AAAA"),
            custom_meaning: None,
        })
        .unwrap()
}

fn run(ws: &Workspace, args: &[&str]) -> super::CliResult<super::Outcome> {
    let mut argv = vec!["compliance", "--config", ws.config.to_str().unwrap()];
    argv.extend_from_slice(args);
    execute(Cli::try_parse_from(argv).unwrap())
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn list_requires_user_or_enrollment() {
    assert!(Cli::try_parse_from(["compliance", "signature", "list"]).is_err());
    let both = ["compliance", "signature", "list", "--user", "U1", "--enrollment", "E1"];
    assert!(Cli::try_parse_from(both).is_err());
    assert!(Cli::try_parse_from(["compliance", "signature", "list", "--user", "U1"]).is_ok());
}

#[test]
fn invalidate_requires_by_and_reason() {
    assert!(Cli::try_parse_from(["compliance", "signature", "invalidate", "--id", "S1"]).is_err());
    assert!(
        Cli::try_parse_from([
            "compliance",
            "signature",
            "invalidate",
            "--id",
            "S1",
            "--by",
            "admin",
            "--reason",
            "Signed in error",
        ])
        .is_ok()
    );
}

#[test]
fn audit_list_accepts_repeated_actions() {
    let cli = Cli::try_parse_from([
        "compliance",
        "audit",
        "list",
        "--action",
        "login",
        "--action",
        "logout",
    ])
    .unwrap();
    let super::Commands::Audit {
        command: super::AuditCommand::List(args),
    } = cli.command
    else {
        panic!("expected audit list");
    };
    assert_eq!(args.actions, vec!["login".to_string(), "logout".to_string()]);
    assert_eq!(args.limit, 50);
}

// ============================================================================
// SECTION: Bounded Reads
// ============================================================================

#[test]
fn read_bytes_with_limit_allows_small_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("small.json");
    fs::write(&path, b"ok").unwrap();
    assert_eq!(read_bytes_with_limit(&path, 16).unwrap(), b"ok");
}

#[test]
fn read_bytes_with_limit_rejects_large_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("large.json");
    fs::write(&path, vec![0_u8; 9]).unwrap();
    match read_bytes_with_limit(&path, 8).unwrap_err() {
        ReadLimitError::TooLarge {
            size,
            limit,
        } => {
            assert_eq!(size, 9);
            assert_eq!(limit, 8);
        }
        ReadLimitError::Io(err) => panic!("unexpected IO error: {err}"),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

#[test]
fn config_validate_reports_valid() {
    let ws = workspace();
    let outcome = run(&ws, &["config", "validate"]).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.output, json!({"status": "valid"}));
}

#[test]
fn hash_prints_known_digest() {
    let ws = workspace();
    let input = ws.dir.path().join("payload.json");
    fs::write(&input, r#"{"b": "x", "a": 1}"#).unwrap();
    let outcome = run(&ws, &["hash", "--input", input.to_str().unwrap()]).unwrap();
    assert_eq!(outcome.output["algorithm"], json!("sha256"));
    assert_eq!(
        outcome.output["value"],
        json!("ecf9e98ec0641e23113ff3ce8bdc78d0ddd249886517fd4a7f68cc83d4e65667")
    );
}

#[test]
fn hash_keeps_shortest_float_text() {
    let ws = workspace();
    let input = ws.dir.path().join("payload.json");
    let canonical = r#"{"points":[[589.5547362875188,196.5182454291729],[0.30000000000000004,0.1]]}"#;
    fs::write(&input, canonical).unwrap();
    let outcome = run(&ws, &["hash", "--input", input.to_str().unwrap()]).unwrap();
    let expected = hash_bytes(DEFAULT_HASH_ALGORITHM, canonical.as_bytes());
    assert_eq!(outcome.output["value"], json!(expected.value));
}

#[test]
fn hash_rejects_non_object_payload() {
    let ws = workspace();
    let input = ws.dir.path().join("payload.json");
    fs::write(&input, "[1, 2, 3]").unwrap();
    let err = run(&ws, &["hash", "--input", input.to_str().unwrap()]).unwrap_err();
    assert!(err.to_string().contains("json object"));
}

#[test]
fn verify_reports_valid_and_missing() {
    let ws = workspace();
    let signature = seed_signature(&ws);

    let outcome = run(&ws, &["signature", "verify", "--id", signature.id.as_str()]).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.output["status"], json!("valid"));

    let missing = run(&ws, &["signature", "verify", "--id", "nope"]).unwrap();
    assert!(!missing.success);
    assert_eq!(missing.output["status"], json!("not_found"));
}

#[test]
fn invalidate_then_list_and_stats() {
    let ws = workspace();
    let signature = seed_signature(&ws);
    let id = signature.id.as_str();

    let outcome = run(&ws, &[
        "signature",
        "invalidate",
        "--id",
        id,
        "--by",
        "admin",
        "--reason",
        "Signed in error",
    ])
    .unwrap();
    assert_eq!(outcome.output["is_valid"], json!(false));

    let again = run(&ws, &[
        "signature",
        "invalidate",
        "--id",
        id,
        "--by",
        "admin",
        "--reason",
        "Again",
    ]);
    assert!(again.is_err());

    let valid = run(&ws, &["signature", "list", "--user", "U1"]).unwrap();
    assert_eq!(valid.output, json!([]));
    let all = run(&ws, &["signature", "list", "--enrollment", "E1", "--include-invalid"]).unwrap();
    assert_eq!(all.output.as_array().map(Vec::len), Some(1));

    let stats = run(&ws, &["signature", "stats"]).unwrap();
    assert_eq!(stats.output["total"], json!(1));
    assert_eq!(stats.output["invalid"], json!(1));
}

#[test]
fn audit_views_return_pages() {
    let ws = workspace();
    let signature = seed_signature(&ws);
    run(&ws, &[
        "signature",
        "invalidate",
        "--id",
        signature.id.as_str(),
        "--by",
        "admin",
        "--reason",
        "Duplicate",
    ])
    .unwrap();

    let security = run(&ws, &["audit", "security"]).unwrap();
    assert_eq!(security.output["total"], json!(1));
    assert_eq!(security.output["entries"][0]["action"], json!("signature_invalidated"));

    let training = run(&ws, &["audit", "training"]).unwrap();
    assert_eq!(training.output["total"], json!(2));

    let filtered =
        run(&ws, &["audit", "list", "--action", "signature_captured", "--limit", "1"]).unwrap();
    assert_eq!(filtered.output["total"], json!(1));

    let bad_limit = run(&ws, &["audit", "list", "--limit", "0"]);
    assert!(bad_limit.is_err());
}

#[test]
fn store_commands_require_sqlite() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("compliance.toml");
    fs::write(&config, "").unwrap();
    let cli = Cli::try_parse_from([
        "compliance",
        "--config",
        config.to_str().unwrap(),
        "signature",
        "stats",
    ])
    .unwrap();
    let err = execute(cli).unwrap_err();
    assert!(err.to_string().contains("store.type"));
}
