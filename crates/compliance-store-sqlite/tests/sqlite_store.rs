// crates/compliance-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Durability, immutability triggers, and query behavior.
// Purpose: Prove the SQLite store honors the compliance store contracts.
// ============================================================================

//! ## Overview
//! Exercises the `SQLite` store directly and through the signature service,
//! audit logger, and attempt throttle. Raw `rusqlite` connections stand in
//! for an operator editing the database file.

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

use std::path::Path;
use std::sync::Arc;

use compliance_core::AttemptThrottle;
use compliance_core::AuditLogStore;
use compliance_core::AuditLogger;
use compliance_core::AuditQuery;
use compliance_core::CompletionSignatureRequest;
use compliance_core::EnrollmentId;
use compliance_core::InvalidationOutcome;
use compliance_core::ManualClock;
use compliance_core::NewAuditEntry;
use compliance_core::NoopTelemetrySink;
use compliance_core::SignatureError;
use compliance_core::SignatureFilter;
use compliance_core::SignatureInvalidation;
use compliance_core::SignatureService;
use compliance_core::SignatureStore;
use compliance_core::SignatureType;
use compliance_core::StaticClientEnvironment;
use compliance_core::StoreError;
use compliance_core::ThrottleEntry;
use compliance_core::ThrottleKey;
use compliance_core::ThrottlePolicy;
use compliance_core::ThrottleStore;
use compliance_core::Timestamp;
use compliance_core::UserId;
use compliance_core::VerificationStatus;
use compliance_core::actions;
use compliance_core::digest_payload;
use compliance_core::resources;
use compliance_store_sqlite::SqliteComplianceStore;
use compliance_store_sqlite::SqliteStoreConfig;
use compliance_store_sqlite::SqliteStoreError;
use compliance_store_sqlite::SqliteSyncMode;
use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;

const START: i64 = 1_700_000_000_000;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

struct Harness {
    _dir: TempDir,
    path: std::path::PathBuf,
    store: SqliteComplianceStore,
    clock: ManualClock,
    service: SignatureService,
    audit: AuditLogger,
}

fn open(path: &Path) -> SqliteComplianceStore {
    SqliteComplianceStore::new(&SqliteStoreConfig::new(path)).unwrap()
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("compliance.db");
    let store = open(&path);
    let clock = ManualClock::new(Timestamp::from_unix_millis(START));
    let telemetry = Arc::new(NoopTelemetrySink);
    let audit =
        AuditLogger::new(Arc::new(store.clone()), Arc::new(clock.clone()), telemetry.clone());
    let service = SignatureService::new(
        Arc::new(store.clone()),
        audit.clone(),
        Arc::new(clock.clone()),
        Arc::new(StaticClientEnvironment {
            device_fingerprint: Some("fp-9".to_string()),
            ip_address: Some("192.0.2.4".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        }),
        telemetry,
    );
    Harness {
        _dir: dir,
        path,
        store,
        clock,
        service,
        audit,
    }
}

fn completion(enrollment: &str, user: &str) -> CompletionSignatureRequest {
    CompletionSignatureRequest {
        enrollment_id: EnrollmentId::from(enrollment),
        user_id: UserId::from(user),
        course_title: "GMP Fundamentals".to_string(),
        signer_name: "Jane Doe".to_string(),
        signer_title: Some("QA Specialist".to_string()),
        signature_image: json!({"strokes": [[1, 2], [3, 4]]}),
        custom_meaning: None,
    }
}

fn raw(path: &Path) -> Connection {
    Connection::open(path).unwrap()
}

fn query(limit: u32) -> AuditQuery {
    AuditQuery {
        limit,
        ..AuditQuery::default()
    }
}

// ============================================================================
// SECTION: Signatures
// ============================================================================

#[test]
fn signature_round_trips_and_survives_reopen() {
    let h = harness();
    let created = h.service.create_completion_signature(completion("E1", "U1")).unwrap();

    let reopened = open(&h.path);
    let loaded = SignatureStore::get(&reopened, &created.id).unwrap().unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.signature_data.get("ip_address"), Some(&json!("192.0.2.4")));
    let keys: Vec<&String> = loaded.signature_data.as_map().keys().collect();
    let original: Vec<&String> = created.signature_data.as_map().keys().collect();
    assert_eq!(keys, original);
}

#[test]
fn stored_signature_verifies() {
    let h = harness();
    let created = h.service.create_completion_signature(completion("E1", "U1")).unwrap();
    let verification = h.service.verify(&created.id).unwrap();
    assert_eq!(verification.status, VerificationStatus::Valid);
}

#[test]
fn fractional_stroke_coordinates_verify_after_reopen() {
    let h = harness();
    let mut ids = Vec::new();
    for step in 0 .. 200_u32 {
        let x = f64::from(step).mul_add(1.618_033_988_749_895, 0.1) * 97.3;
        let mut request = completion("E1", "U1");
        request.signature_image = json!({"points": [[x, x / 3.0], [x / 7.0, 0.1 + 0.2]]});
        ids.push(h.service.create_completion_signature(request).unwrap().id);
    }

    let reopened = open(&h.path);
    for id in &ids {
        let loaded = SignatureStore::get(&reopened, id).unwrap().unwrap();
        let digest = digest_payload(&loaded.signature_data).unwrap();
        assert!(digest.matches_hex(&loaded.signature_hash), "digest drifted for {id}");
        assert_eq!(h.service.verify(id).unwrap().status, VerificationStatus::Valid);
    }
}

#[test]
fn edited_signature_data_is_detected() {
    let h = harness();
    let created = h.service.create_completion_signature(completion("E1", "U1")).unwrap();

    let conn = raw(&h.path);
    conn.execute_batch(
        "DROP TRIGGER signatures_content_is_immutable; DROP TRIGGER signatures_invalid_is_final;",
    )
    .unwrap();
    conn.execute(
        "UPDATE signatures SET signature_data = ?1 WHERE id = ?2",
        rusqlite::params![r#"{"signature_image":"forged"}"#, created.id.as_str()],
    )
    .unwrap();

    let verification = h.service.verify(&created.id).unwrap();
    assert_eq!(verification.status, VerificationStatus::IntegrityCompromised);
}

#[test]
fn triggers_reject_signature_delete_and_content_update() {
    let h = harness();
    let created = h.service.create_completion_signature(completion("E1", "U1")).unwrap();
    let conn = raw(&h.path);

    let deleted = conn
        .execute("DELETE FROM signatures WHERE id = ?1", rusqlite::params![created.id.as_str()]);
    assert!(deleted.is_err());

    let edited = conn.execute(
        "UPDATE signatures SET signer_name = 'Someone Else' WHERE id = ?1",
        rusqlite::params![created.id.as_str()],
    );
    assert!(edited.is_err());
    assert!(SignatureStore::get(&h.store, &created.id).unwrap().is_some());
}

#[test]
fn invalidated_signature_cannot_be_revalidated() {
    let h = harness();
    let created = h.service.create_completion_signature(completion("E1", "U1")).unwrap();
    h.service.invalidate(&created.id, &UserId::from("admin"), "Signed in error", None).unwrap();

    let conn = raw(&h.path);
    let revalidated = conn.execute(
        "UPDATE signatures SET is_valid = 1, invalidated_at = NULL, invalidated_by = NULL, \
         invalidation_reason = NULL WHERE id = ?1",
        rusqlite::params![created.id.as_str()],
    );
    assert!(revalidated.is_err());

    let reopened = open(&h.path);
    let loaded = SignatureStore::get(&reopened, &created.id).unwrap().unwrap();
    assert!(!loaded.is_valid);
    let invalidation = loaded.invalidation.unwrap();
    assert_eq!(invalidation.reason, "Signed in error");
    assert_eq!(invalidation.invalidated_by, UserId::from("admin"));
}

#[test]
fn invalidate_reports_each_outcome() {
    let h = harness();
    let created = h.service.create_completion_signature(completion("E1", "U1")).unwrap();
    let invalidation = SignatureInvalidation {
        invalidated_at: Timestamp::from_unix_millis(START + 10),
        invalidated_by: UserId::from("admin"),
        reason: "Duplicate".to_string(),
    };

    let first = h.store.invalidate(&created.id, &invalidation).unwrap();
    let InvalidationOutcome::Applied(updated) = first else {
        panic!("expected applied, got {first:?}");
    };
    assert!(!updated.is_valid);
    assert_eq!(updated.invalidation, Some(invalidation.clone()));

    let second = h.store.invalidate(&created.id, &invalidation).unwrap();
    assert_eq!(second, InvalidationOutcome::AlreadyInvalid);

    let missing = h.store.invalidate(&"missing".into(), &invalidation).unwrap();
    assert_eq!(missing, InvalidationOutcome::NotFound);
}

#[test]
fn service_invalidate_twice_is_rejected() {
    let h = harness();
    let created = h.service.create_completion_signature(completion("E1", "U1")).unwrap();
    h.service.invalidate(&created.id, &UserId::from("admin"), "Duplicate", None).unwrap();
    let err = h.service.invalidate(&created.id, &UserId::from("admin"), "Again", None).unwrap_err();
    assert!(matches!(err, SignatureError::AlreadyInvalidated(_)));
}

#[test]
fn listings_are_newest_first_and_respect_filter() {
    let h = harness();
    let older = h.service.create_completion_signature(completion("E1", "U1")).unwrap();
    h.clock.advance_ms(1_000);
    let newer = h.service.create_completion_signature(completion("E1", "U1")).unwrap();
    h.clock.advance_ms(1_000);
    let other = h.service.create_completion_signature(completion("E2", "U1")).unwrap();
    h.service.invalidate(&older.id, &UserId::from("admin"), "Superseded", None).unwrap();

    let valid = h.service.get_by_enrollment(&EnrollmentId::from("E1"), SignatureFilter::ValidOnly);
    let ids: Vec<_> = valid.unwrap().into_iter().map(|sig| sig.id).collect();
    assert_eq!(ids, vec![newer.id.clone()]);

    let all = h
        .service
        .get_by_user(&UserId::from("U1"), SignatureFilter::IncludeInvalid)
        .unwrap();
    let ids: Vec<_> = all.into_iter().map(|sig| sig.id).collect();
    assert_eq!(ids, vec![other.id, newer.id, older.id]);
}

#[test]
fn statistics_group_by_type_and_validity() {
    let h = harness();
    let first = h.service.create_completion_signature(completion("E1", "U1")).unwrap();
    h.service.create_completion_signature(completion("E2", "U2")).unwrap();
    h.service
        .create_acknowledgment_signature(compliance_core::AcknowledgmentSignatureRequest {
            enrollment_id: EnrollmentId::from("E3"),
            user_id: UserId::from("U3"),
            acknowledgment_text: "I have read SOP-12.".to_string(),
            signer_name: "Sam Lee".to_string(),
            signer_title: None,
            signature_image: json!("data:image/png;base64,AAAA"),
            custom_meaning: None,
        })
        .unwrap();
    h.service.invalidate(&first.id, &UserId::from("admin"), "Error", None).unwrap();

    let stats = h.service.get_statistics().unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.valid, 2);
    assert_eq!(stats.invalid, 1);
    assert_eq!(stats.by_type.get(&SignatureType::TrainingCompletion), Some(&2));
    assert_eq!(stats.by_type.get(&SignatureType::Acknowledgment), Some(&1));
}

#[test]
fn unknown_signature_type_is_reported_as_corruption() {
    let h = harness();
    let created = h.service.create_completion_signature(completion("E1", "U1")).unwrap();
    let conn = raw(&h.path);
    conn.execute_batch(
        "DROP TRIGGER signatures_content_is_immutable; DROP TRIGGER signatures_invalid_is_final;",
    )
    .unwrap();
    conn.execute(
        "UPDATE signatures SET signature_type = 'notarized' WHERE id = ?1",
        rusqlite::params![created.id.as_str()],
    )
    .unwrap();

    let err = SignatureStore::get(&h.store, &created.id).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}

// ============================================================================
// SECTION: Audit Log
// ============================================================================

#[test]
fn audit_rows_cannot_be_updated_or_deleted() {
    let h = harness();
    h.audit.append(NewAuditEntry::new(actions::LOGIN, "session").actor("U1".into())).unwrap();
    let conn = raw(&h.path);

    assert!(conn.execute("UPDATE audit_logs SET action = 'LOGOUT'", []).is_err());
    assert!(conn.execute("DELETE FROM audit_logs", []).is_err());

    let page = AuditLogStore::query(&h.store, &query(10)).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.entries[0].action, actions::LOGIN);
}

#[test]
fn audit_query_filters_and_paginates() {
    let h = harness();
    for index in 0..5 {
        h.audit
            .append(
                NewAuditEntry::new(actions::LOGIN_FAILED, "session")
                    .new_values(json!({"identifier": format!("user{index}@example.com")}))
                    .failed("Invalid credentials"),
            )
            .unwrap();
        h.clock.advance_ms(100);
    }
    h.audit.append(NewAuditEntry::new(actions::LOGIN, "session").actor("U1".into())).unwrap();

    let failed = AuditQuery {
        actions: vec![actions::LOGIN_FAILED.to_string()],
        success: Some(false),
        limit: 2,
        offset: 1,
        ..AuditQuery::default()
    };
    let page = AuditLogStore::query(&h.store, &failed).unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.entries.len(), 2);
    assert_eq!(page.entries[0].new_values, Some(json!({"identifier": "user3@example.com"})));
    assert_eq!(page.entries[1].new_values, Some(json!({"identifier": "user2@example.com"})));
    assert_eq!(page.entries[0].error_message.as_deref(), Some("Invalid credentials"));

    let by_actor = AuditQuery {
        actor_id: Some("U1".into()),
        limit: 10,
        ..AuditQuery::default()
    };
    let page = AuditLogStore::query(&h.store, &by_actor).unwrap();
    assert_eq!(page.total, 1);
    assert!(page.entries[0].success);
}

#[test]
fn audit_time_range_is_inclusive() {
    let h = harness();
    for _ in 0..3 {
        h.audit.append(NewAuditEntry::new(actions::LOGOUT, "session")).unwrap();
        h.clock.advance_ms(1_000);
    }
    let ranged = AuditQuery {
        since: Some(Timestamp::from_unix_millis(START + 1_000)),
        until: Some(Timestamp::from_unix_millis(START + 2_000)),
        limit: 10,
        ..AuditQuery::default()
    };
    let page = AuditLogStore::query(&h.store, &ranged).unwrap();
    assert_eq!(page.total, 2);
}

#[test]
fn captured_signature_is_audited_in_same_database() {
    let h = harness();
    let created = h.service.create_completion_signature(completion("E1", "U1")).unwrap();
    let history =
        h.audit.resource_history(resources::SIGNATURE, created.id.as_str(), 10, 0).unwrap();
    assert_eq!(history.total, 1);
    assert_eq!(history.entries[0].action, actions::SIGNATURE_CAPTURED);
    assert_eq!(history.entries[0].client.ip_address.as_deref(), Some("192.0.2.4"));
}

// ============================================================================
// SECTION: Throttle
// ============================================================================

#[test]
fn throttle_entries_persist_across_instances() {
    let h = harness();
    let store: Arc<dyn ThrottleStore> = Arc::new(h.store.clone());
    let key = ThrottleKey::new("login", "user@example.com");
    let entry = ThrottleEntry {
        attempts: 3,
        window_start: Timestamp::from_unix_millis(START),
        blocked_until: Some(Timestamp::from_unix_millis(START + 500)),
    };
    store.put(&key, entry).unwrap();

    let reopened: Arc<dyn ThrottleStore> = Arc::new(open(&h.path));
    assert_eq!(reopened.get(&key).unwrap(), Some(entry));
    reopened.delete(&key).unwrap();
    assert_eq!(store.get(&key).unwrap(), None);
}

#[test]
fn throttle_update_and_purge() {
    let h = harness();
    let store: Arc<dyn ThrottleStore> = Arc::new(h.store.clone());
    let stale = ThrottleKey::new("login", "old");
    let fresh = ThrottleKey::new("login", "new");
    for (key, start) in [(&stale, START - 10_000), (&fresh, START)] {
        let stored = store
            .update(key, &mut |current: Option<ThrottleEntry>| {
                assert!(current.is_none());
                Some(ThrottleEntry {
                    attempts: 1,
                    window_start: Timestamp::from_unix_millis(start),
                    blocked_until: None,
                })
            })
            .unwrap();
        assert_eq!(stored.map(|entry| entry.attempts), Some(1));
    }

    let cutoff = Timestamp::from_unix_millis(START - 1);
    let removed = store
        .purge("login:", &|_key: &ThrottleKey, entry: &ThrottleEntry| entry.window_start < cutoff)
        .unwrap();
    assert_eq!(removed, 1);
    assert!(store.get(&stale).unwrap().is_none());
    assert!(store.get(&fresh).unwrap().is_some());

    let cleared = store.update(&fresh, &mut |_current: Option<ThrottleEntry>| None).unwrap();
    assert!(cleared.is_none());
    assert!(store.get(&fresh).unwrap().is_none());
}

#[test]
fn throttle_purge_only_visits_keys_under_the_prefix() {
    let h = harness();
    let store: Arc<dyn ThrottleStore> = Arc::new(h.store.clone());
    let entry = ThrottleEntry {
        attempts: 1,
        window_start: Timestamp::from_unix_millis(START),
        blocked_until: None,
    };
    let keys = [
        ThrottleKey::new("resend_verification", "a"),
        ThrottleKey::new("resend_verification", "b"),
        ThrottleKey::new("resendXverification", "c"),
        ThrottleKey::new("resend_verification2", "d"),
        ThrottleKey::new("login", "e"),
        ThrottleKey::new("signup", "f"),
    ];
    for key in &keys {
        store.put(key, entry).unwrap();
    }

    let visited = std::sync::Mutex::new(Vec::new());
    let removed = store
        .purge("resend_verification:", &|key: &ThrottleKey, _entry: &ThrottleEntry| {
            visited.lock().unwrap().push(key.as_str().to_string());
            true
        })
        .unwrap();
    assert_eq!(removed, 2);
    let mut visited = visited.into_inner().unwrap();
    visited.sort();
    assert_eq!(visited, vec!["resend_verification:a", "resend_verification:b"]);
    for key in &keys[2 ..] {
        assert!(store.get(key).unwrap().is_some(), "{key} was purged");
    }
}

#[test]
fn attempt_throttle_blocks_over_sqlite() {
    let h = harness();
    let throttle = AttemptThrottle::new(
        "login",
        ThrottlePolicy::new(3, 60_000, 120_000),
        Arc::new(h.store.clone()),
        Arc::new(h.clock.clone()),
        Arc::new(NoopTelemetrySink),
    );
    assert!(!throttle.record_attempt("user@example.com").unwrap().blocked);
    assert!(!throttle.record_attempt("user@example.com").unwrap().blocked);
    let third = throttle.record_attempt("user@example.com").unwrap();
    assert!(third.blocked);
    assert_eq!(third.attempts_remaining, 0);

    let reopened = AttemptThrottle::new(
        "login",
        ThrottlePolicy::new(3, 60_000, 120_000),
        Arc::new(open(&h.path)),
        Arc::new(h.clock.clone()),
        Arc::new(NoopTelemetrySink),
    );
    assert!(reopened.is_blocked("user@example.com").unwrap());
    assert_eq!(reopened.remaining_time_ms("user@example.com").unwrap(), 120_000);

    h.clock.advance_ms(120_000);
    assert!(!reopened.is_blocked("user@example.com").unwrap());
}

// ============================================================================
// SECTION: Open
// ============================================================================

#[test]
fn schema_version_mismatch_fails_closed() {
    let h = harness();
    raw(&h.path).execute("UPDATE store_meta SET version = 99", []).unwrap();
    let err = SqliteComplianceStore::new(&SqliteStoreConfig::new(&h.path)).err().unwrap();
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)));
}

#[test]
fn directory_path_is_rejected() {
    let dir = TempDir::new().unwrap();
    let err = SqliteComplianceStore::new(&SqliteStoreConfig::new(dir.path())).err().unwrap();
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn config_deserializes_with_defaults() {
    let config: SqliteStoreConfig =
        serde_json::from_value(json!({"path": "data/compliance.db", "sync_mode": "normal"}))
            .unwrap();
    assert_eq!(config.busy_timeout_ms, 5_000);
    assert_eq!(config.sync_mode, SqliteSyncMode::Normal);
    assert_eq!(config, SqliteStoreConfig {
        sync_mode: SqliteSyncMode::Normal,
        ..SqliteStoreConfig::new("data/compliance.db")
    });
}
