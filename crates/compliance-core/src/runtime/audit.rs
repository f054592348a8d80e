// crates/compliance-core/src/runtime/audit.rs
// ============================================================================
// Module: Audit Logger
// Description: Append-only recorder and read views for the compliance audit trail.
// Purpose: Record every guarded action, including failures, with server time.
// Dependencies: crate::core, crate::interfaces, crate::runtime::telemetry, serde_json
// ============================================================================

//! ## Overview
//! [`AuditLogger::append`] is the raw write primitive and reports failure to
//! its caller. [`AuditLogger::notify`] and the convenience emitters are
//! best-effort: a failed write is reported to the telemetry sink and never
//! surfaces as an error to the action that triggered it.
//!
//! The logger exposes no update or delete path. History is write-once,
//! read-many.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use crate::core::AuditLogEntry;
use crate::core::AuditPage;
use crate::core::AuditQuery;
use crate::core::ClientMetadata;
use crate::core::ElectronicSignature;
use crate::core::MAX_AUDIT_PAGE_SIZE;
use crate::core::NewAuditEntry;
use crate::core::Timestamp;
use crate::core::UserId;
use crate::core::actions;
use crate::core::resources;
use crate::interfaces::AuditLogStore;
use crate::interfaces::Clock;
use crate::interfaces::StoreError;
use crate::runtime::telemetry::EVENT_AUDIT_WRITE_FAILED;
use crate::runtime::telemetry::TelemetryEvent;
use crate::runtime::telemetry::TelemetrySink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of an action or resource type label.
const MAX_LABEL_LENGTH: usize = 128;
/// Telemetry component name.
const COMPONENT: &str = "audit_logger";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Audit logger errors.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Entry or query is malformed.
    #[error("audit log invalid input: {0}")]
    Invalid(String),
    /// Backing store rejected the operation.
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

// ============================================================================
// SECTION: Data Modification
// ============================================================================

/// Kind of generic data modification being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataChange {
    /// A record was created.
    Created,
    /// A record was updated.
    Updated,
    /// A record was deleted.
    Deleted,
}

impl DataChange {
    /// Returns the audit action label.
    const fn action(self) -> &'static str {
        match self {
            Self::Created => actions::DATA_CREATED,
            Self::Updated => actions::DATA_UPDATED,
            Self::Deleted => actions::DATA_DELETED,
        }
    }
}

// ============================================================================
// SECTION: Logger
// ============================================================================

/// Append-only audit recorder.
#[derive(Clone)]
pub struct AuditLogger {
    /// Insert-only backing store.
    store: Arc<dyn AuditLogStore>,
    /// Source of server-assigned timestamps.
    clock: Arc<dyn Clock>,
    /// Side channel for best-effort failures.
    telemetry: Arc<dyn TelemetrySink>,
}

impl AuditLogger {
    /// Creates a logger over the given store, clock, and telemetry sink.
    #[must_use]
    pub fn new(
        store: Arc<dyn AuditLogStore>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            store,
            clock,
            telemetry,
        }
    }

    /// Writes one immutable entry stamped with the current server time.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Invalid`] for blank or oversized labels and
    /// [`AuditError::Persistence`] when the store rejects the write.
    pub fn append(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, AuditError> {
        validate_label("action", &entry.action)?;
        validate_label("resource_type", &entry.resource_type)?;
        let created_at = self.clock.now();
        Ok(self.store.insert(entry, created_at)?)
    }

    /// Best-effort append: returns whether the write succeeded and reports
    /// failures to telemetry instead of the caller.
    pub fn notify(&self, entry: NewAuditEntry) -> bool {
        let action = entry.action.clone();
        match self.append(entry) {
            Ok(_) => true,
            Err(err) => {
                self.telemetry.record(&TelemetryEvent::new(
                    EVENT_AUDIT_WRITE_FAILED,
                    self.clock.now(),
                    COMPONENT,
                    Some(action),
                    err.to_string(),
                ));
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Returns one page of entries matching `query`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Invalid`] for an out-of-range page size or an
    /// inverted time range, and [`AuditError::Persistence`] on store failure.
    pub fn list(&self, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        if query.limit == 0 || query.limit > MAX_AUDIT_PAGE_SIZE {
            return Err(AuditError::Invalid(format!(
                "limit must be between 1 and {MAX_AUDIT_PAGE_SIZE}"
            )));
        }
        if let (Some(since), Some(until)) = (query.since, query.until)
            && since > until
        {
            return Err(AuditError::Invalid("since must not be after until".to_string()));
        }
        Ok(self.store.query(query)?)
    }

    /// Lists security-sensitive events (failed logins, locks, unauthorized access).
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] as for [`Self::list`].
    pub fn security_events(
        &self,
        since: Option<Timestamp>,
        until: Option<Timestamp>,
        limit: u32,
        offset: u64,
    ) -> Result<AuditPage, AuditError> {
        self.list(&AuditQuery {
            actions: owned(actions::SECURITY_ACTIONS),
            since,
            until,
            limit,
            offset,
            ..AuditQuery::default()
        })
    }

    /// Lists training events (course, module, quiz, and signature actions).
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] as for [`Self::list`].
    pub fn training_events(
        &self,
        actor_id: Option<UserId>,
        limit: u32,
        offset: u64,
    ) -> Result<AuditPage, AuditError> {
        self.list(&AuditQuery {
            actor_id,
            actions: owned(actions::TRAINING_ACTIONS),
            limit,
            offset,
            ..AuditQuery::default()
        })
    }

    /// Lists the history of one resource.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] as for [`Self::list`].
    pub fn resource_history(
        &self,
        resource_type: &str,
        resource_id: &str,
        limit: u32,
        offset: u64,
    ) -> Result<AuditPage, AuditError> {
        self.list(&AuditQuery {
            resource_type: Some(resource_type.to_string()),
            resource_id: Some(resource_id.to_string()),
            limit,
            offset,
            ..AuditQuery::default()
        })
    }

    /// Lists everything one user did.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] as for [`Self::list`].
    pub fn user_history(
        &self,
        user_id: &UserId,
        limit: u32,
        offset: u64,
    ) -> Result<AuditPage, AuditError> {
        self.list(&AuditQuery {
            actor_id: Some(user_id.clone()),
            limit,
            offset,
            ..AuditQuery::default()
        })
    }

    // ------------------------------------------------------------------------
    // Convenience emitters
    // ------------------------------------------------------------------------

    /// Records a successful login.
    pub fn log_login(&self, user_id: &UserId, client: Option<ClientMetadata>) -> bool {
        self.notify(
            NewAuditEntry::new(actions::LOGIN, resources::USER)
                .actor(user_id.clone())
                .resource(user_id.as_str())
                .client(client),
        )
    }

    /// Records a logout.
    pub fn log_logout(&self, user_id: &UserId, client: Option<ClientMetadata>) -> bool {
        self.notify(
            NewAuditEntry::new(actions::LOGOUT, resources::USER)
                .actor(user_id.clone())
                .resource(user_id.as_str())
                .client(client),
        )
    }

    /// Records a failed login for the attempted identifier.
    pub fn log_failed_login(
        &self,
        attempted_identifier: &str,
        reason: &str,
        client: Option<ClientMetadata>,
    ) -> bool {
        self.notify(
            NewAuditEntry::new(actions::LOGIN_FAILED, resources::USER)
                .new_values(json!({ "identifier": attempted_identifier }))
                .failed(reason)
                .client(client),
        )
    }

    /// Records an account lock triggered by repeated failures.
    pub fn log_account_locked(
        &self,
        identifier: &str,
        blocked_until: Timestamp,
        client: Option<ClientMetadata>,
    ) -> bool {
        self.notify(
            NewAuditEntry::new(actions::ACCOUNT_LOCKED, resources::USER)
                .new_values(json!({
                    "identifier": identifier,
                    "blocked_until": blocked_until.as_unix_millis(),
                }))
                .failed("too many failed attempts")
                .client(client),
        )
    }

    /// Records access to a resource the caller was not authorized for.
    pub fn log_unauthorized_access(
        &self,
        user_id: Option<&UserId>,
        resource_type: &str,
        resource_id: Option<&str>,
        client: Option<ClientMetadata>,
    ) -> bool {
        let mut entry = NewAuditEntry::new(actions::UNAUTHORIZED_ACCESS, resource_type)
            .failed("unauthorized access")
            .client(client);
        entry.actor_id = user_id.cloned();
        entry.resource_id = resource_id.map(ToString::to_string);
        self.notify(entry)
    }

    /// Records a course start.
    pub fn log_course_started(&self, user_id: &UserId, course_id: &str) -> bool {
        self.notify(
            NewAuditEntry::new(actions::COURSE_STARTED, resources::COURSE)
                .actor(user_id.clone())
                .resource(course_id),
        )
    }

    /// Records a course completion with the final score when known.
    pub fn log_course_completed(
        &self,
        user_id: &UserId,
        course_id: &str,
        score: Option<u32>,
    ) -> bool {
        self.notify(
            NewAuditEntry::new(actions::COURSE_COMPLETED, resources::COURSE)
                .actor(user_id.clone())
                .resource(course_id)
                .new_values(json!({ "score": score })),
        )
    }

    /// Records module progress as a percentage.
    pub fn log_module_progress(
        &self,
        user_id: &UserId,
        module_id: &str,
        progress_percent: u8,
    ) -> bool {
        let action = if progress_percent >= 100 {
            actions::MODULE_COMPLETED
        } else {
            actions::MODULE_PROGRESS
        };
        self.notify(
            NewAuditEntry::new(action, resources::MODULE)
                .actor(user_id.clone())
                .resource(module_id)
                .new_values(json!({ "progress": progress_percent.min(100) })),
        )
    }

    /// Records a quiz attempt and its result.
    pub fn log_quiz_attempt(
        &self,
        user_id: &UserId,
        quiz_id: &str,
        score: u32,
        passed: bool,
    ) -> bool {
        self.notify(
            NewAuditEntry::new(actions::QUIZ_ATTEMPTED, resources::QUIZ)
                .actor(user_id.clone())
                .resource(quiz_id)
                .new_values(json!({ "score": score, "passed": passed })),
        )
    }

    /// Records a captured signature.
    pub fn log_signature_captured(
        &self,
        signature: &ElectronicSignature,
        client: Option<ClientMetadata>,
    ) -> bool {
        self.notify(
            NewAuditEntry::new(actions::SIGNATURE_CAPTURED, resources::SIGNATURE)
                .actor(signature.user_id.clone())
                .resource(signature.id.as_str())
                .new_values(json!({
                    "enrollment_id": signature.enrollment_id,
                    "signature_type": signature.signature_type,
                    "signer_name": signature.signer_name,
                    "signature_meaning": signature.signature_meaning,
                    "signature_hash": signature.signature_hash,
                }))
                .client(client),
        )
    }

    /// Records a signature invalidation.
    pub fn log_signature_invalidated(
        &self,
        signature: &ElectronicSignature,
        invalidated_by: &UserId,
        reason: &str,
        client: Option<ClientMetadata>,
    ) -> bool {
        self.notify(
            NewAuditEntry::new(actions::SIGNATURE_INVALIDATED, resources::SIGNATURE)
                .actor(invalidated_by.clone())
                .resource(signature.id.as_str())
                .old_values(json!({ "is_valid": true }))
                .new_values(json!({ "is_valid": false, "invalidation_reason": reason }))
                .client(client),
        )
    }

    /// Records a generic data modification with before/after snapshots.
    pub fn log_data_modification(
        &self,
        user_id: &UserId,
        change: DataChange,
        resource_type: &str,
        resource_id: &str,
        old_values: Option<serde_json::Value>,
        new_values: Option<serde_json::Value>,
    ) -> bool {
        let mut entry = NewAuditEntry::new(change.action(), resource_type)
            .actor(user_id.clone())
            .resource(resource_id);
        entry.old_values = old_values;
        entry.new_values = new_values;
        self.notify(entry)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates an action or resource type label.
fn validate_label(field: &str, value: &str) -> Result<(), AuditError> {
    if value.trim().is_empty() {
        return Err(AuditError::Invalid(format!("{field} must not be blank")));
    }
    if value.len() > MAX_LABEL_LENGTH {
        return Err(AuditError::Invalid(format!(
            "{field} exceeds {MAX_LABEL_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Converts a static label set into owned strings.
fn owned(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|label| (*label).to_string()).collect()
}
