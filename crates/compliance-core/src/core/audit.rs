// crates/compliance-core/src/core/audit.rs
// ============================================================================
// Module: Audit Trail Model
// Description: Audit log entries, action taxonomy, and query shapes.
// Purpose: Define the write-once record of compliance-relevant actions.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! An [`AuditLogEntry`] records one compliance-relevant action, successful or
//! not. Entries carry a server-assigned timestamp and are never updated or
//! deleted; there is no type in this module that describes a modification.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::AuditEntryId;
use crate::core::identifiers::UserId;
use crate::core::signature::ClientMetadata;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Action Taxonomy
// ============================================================================

/// Audit action labels recognized by the compliance subsystem.
pub mod actions {
    /// Successful login.
    pub const LOGIN: &str = "login";
    /// Logout.
    pub const LOGOUT: &str = "logout";
    /// Failed login attempt.
    pub const LOGIN_FAILED: &str = "login_failed";
    /// Account locked after repeated failures.
    pub const ACCOUNT_LOCKED: &str = "account_locked";
    /// Access to a resource without authorization.
    pub const UNAUTHORIZED_ACCESS: &str = "unauthorized_access";
    /// Authenticated user denied by permission checks.
    pub const PERMISSION_DENIED: &str = "permission_denied";
    /// Password reset requested.
    pub const PASSWORD_RESET_REQUESTED: &str = "password_reset_requested";
    /// Course started.
    pub const COURSE_STARTED: &str = "course_started";
    /// Course completed.
    pub const COURSE_COMPLETED: &str = "course_completed";
    /// Module started.
    pub const MODULE_STARTED: &str = "module_started";
    /// Module completed.
    pub const MODULE_COMPLETED: &str = "module_completed";
    /// Module progress update.
    pub const MODULE_PROGRESS: &str = "module_progress";
    /// Quiz attempted; score and result are in the new values.
    pub const QUIZ_ATTEMPTED: &str = "quiz_attempted";
    /// Electronic signature captured.
    pub const SIGNATURE_CAPTURED: &str = "signature_captured";
    /// Electronic signature invalidated.
    pub const SIGNATURE_INVALIDATED: &str = "signature_invalidated";
    /// Generic create of a record.
    pub const DATA_CREATED: &str = "data_created";
    /// Generic update of a record.
    pub const DATA_UPDATED: &str = "data_updated";
    /// Generic delete of a record.
    pub const DATA_DELETED: &str = "data_deleted";

    /// Actions surfaced by the security events view.
    pub const SECURITY_ACTIONS: &[&str] = &[
        LOGIN_FAILED,
        ACCOUNT_LOCKED,
        UNAUTHORIZED_ACCESS,
        PERMISSION_DENIED,
        SIGNATURE_INVALIDATED,
        PASSWORD_RESET_REQUESTED,
    ];

    /// Actions surfaced by the training events view.
    pub const TRAINING_ACTIONS: &[&str] = &[
        COURSE_STARTED,
        COURSE_COMPLETED,
        MODULE_STARTED,
        MODULE_COMPLETED,
        MODULE_PROGRESS,
        QUIZ_ATTEMPTED,
        SIGNATURE_CAPTURED,
        SIGNATURE_INVALIDATED,
    ];
}

/// Resource type labels used by built-in emitters.
pub mod resources {
    /// User account or session.
    pub const USER: &str = "user";
    /// Training course.
    pub const COURSE: &str = "course";
    /// Course module.
    pub const MODULE: &str = "module";
    /// Quiz.
    pub const QUIZ: &str = "quiz";
    /// Electronic signature.
    pub const SIGNATURE: &str = "electronic_signature";
}

// ============================================================================
// SECTION: Entries
// ============================================================================

/// Audit entry as assembled by callers; the logger assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuditEntry {
    /// Acting user, when known.
    pub actor_id: Option<UserId>,
    /// Action label (see [`actions`]).
    pub action: String,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier, when applicable.
    pub resource_id: Option<String>,
    /// Snapshot before the action.
    pub old_values: Option<Value>,
    /// Snapshot after the action.
    pub new_values: Option<Value>,
    /// Whether the action succeeded.
    pub success: bool,
    /// Failure description for unsuccessful actions.
    pub error_message: Option<String>,
    /// Client context.
    pub client: ClientMetadata,
}

impl NewAuditEntry {
    /// Starts a successful entry for `action` on `resource_type`.
    #[must_use]
    pub fn new(action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            actor_id: None,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            old_values: None,
            new_values: None,
            success: true,
            error_message: None,
            client: ClientMetadata::default(),
        }
    }

    /// Sets the acting user.
    #[must_use]
    pub fn actor(mut self, actor_id: UserId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Sets the resource identifier.
    #[must_use]
    pub fn resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Sets the before snapshot.
    #[must_use]
    pub fn old_values(mut self, values: Value) -> Self {
        self.old_values = Some(values);
        self
    }

    /// Sets the after snapshot.
    #[must_use]
    pub fn new_values(mut self, values: Value) -> Self {
        self.new_values = Some(values);
        self
    }

    /// Marks the entry as a failure with a message.
    #[must_use]
    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(message.into());
        self
    }

    /// Attaches client context when provided.
    #[must_use]
    pub fn client(mut self, client: Option<ClientMetadata>) -> Self {
        if let Some(client) = client {
            self.client = client;
        }
        self
    }

    /// Builds the stored entry.
    #[must_use]
    pub fn into_entry(self, id: AuditEntryId, created_at: Timestamp) -> AuditLogEntry {
        AuditLogEntry {
            id,
            actor_id: self.actor_id,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            old_values: self.old_values,
            new_values: self.new_values,
            success: self.success,
            error_message: self.error_message,
            created_at,
            client: self.client,
        }
    }
}

/// Immutable stored audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Entry identifier.
    pub id: AuditEntryId,
    /// Acting user, when known.
    pub actor_id: Option<UserId>,
    /// Action label.
    pub action: String,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier, when applicable.
    pub resource_id: Option<String>,
    /// Snapshot before the action.
    pub old_values: Option<Value>,
    /// Snapshot after the action.
    pub new_values: Option<Value>,
    /// Whether the action succeeded.
    pub success: bool,
    /// Failure description for unsuccessful actions.
    pub error_message: Option<String>,
    /// Server-assigned time of the write.
    pub created_at: Timestamp,
    /// Client context.
    pub client: ClientMetadata,
}

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Default page size for audit listings.
pub const DEFAULT_AUDIT_PAGE_SIZE: u32 = 50;
/// Maximum page size for audit listings.
pub const MAX_AUDIT_PAGE_SIZE: u32 = 500;

/// Filtered, paginated audit query. Results are newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQuery {
    /// Only entries by this actor.
    pub actor_id: Option<UserId>,
    /// Only entries whose action is in this set (empty means any).
    pub actions: Vec<String>,
    /// Only entries for this resource type.
    pub resource_type: Option<String>,
    /// Only entries for this resource identifier.
    pub resource_id: Option<String>,
    /// Only successful (`true`) or failed (`false`) entries.
    pub success: Option<bool>,
    /// Inclusive lower time bound.
    pub since: Option<Timestamp>,
    /// Inclusive upper time bound.
    pub until: Option<Timestamp>,
    /// Page size.
    pub limit: u32,
    /// Entries to skip.
    pub offset: u64,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            actor_id: None,
            actions: Vec::new(),
            resource_type: None,
            resource_id: None,
            success: None,
            since: None,
            until: None,
            limit: DEFAULT_AUDIT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl AuditQuery {
    /// Returns true when `entry` satisfies every filter.
    #[must_use]
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(actor_id) = &self.actor_id
            && entry.actor_id.as_ref() != Some(actor_id)
        {
            return false;
        }
        if !self.actions.is_empty() && !self.actions.iter().any(|action| *action == entry.action)
        {
            return false;
        }
        if let Some(resource_type) = &self.resource_type
            && entry.resource_type != *resource_type
        {
            return false;
        }
        if let Some(resource_id) = &self.resource_id
            && entry.resource_id.as_deref() != Some(resource_id.as_str())
        {
            return false;
        }
        if let Some(success) = self.success
            && entry.success != success
        {
            return false;
        }
        if let Some(since) = self.since
            && entry.created_at < since
        {
            return false;
        }
        if let Some(until) = self.until
            && entry.created_at > until
        {
            return false;
        }
        true
    }
}

/// One page of audit entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditPage {
    /// Entries on this page, newest first.
    pub entries: Vec<AuditLogEntry>,
    /// Total matching entries across all pages.
    pub total: u64,
}
