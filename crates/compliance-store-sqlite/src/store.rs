// crates/compliance-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Compliance Store
// Description: Durable signature, audit log, and throttle stores backed by SQLite WAL.
// Purpose: Persist compliance records with storage-level immutability rules.
// Dependencies: compliance-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements [`SignatureStore`], [`AuditLogStore`], and
//! [`ThrottleStore`] over one `SQLite` database. The schema is versioned via
//! `store_meta` and opening a database with another version fails closed.
//!
//! Triggers reject deleting signatures, updating invalidated signatures,
//! rewriting signature content columns, and any update or delete of audit
//! rows. Throttle updates run inside `BEGIN IMMEDIATE` so processes sharing
//! the file serialize their read-modify-write.
//!
//! Security posture: database contents are untrusted. Rows that fail to
//! decode are reported as corruption rather than skipped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use compliance_core::AuditEntryId;
use compliance_core::AuditLogEntry;
use compliance_core::AuditLogStore;
use compliance_core::AuditPage;
use compliance_core::AuditQuery;
use compliance_core::ClientMetadata;
use compliance_core::ElectronicSignature;
use compliance_core::EnrollmentId;
use compliance_core::InvalidationOutcome;
use compliance_core::NewAuditEntry;
use compliance_core::NewSignatureRecord;
use compliance_core::SignatureFilter;
use compliance_core::SignatureId;
use compliance_core::SignatureInvalidation;
use compliance_core::SignaturePayload;
use compliance_core::SignatureStatistics;
use compliance_core::SignatureStore;
use compliance_core::SignatureType;
use compliance_core::StoreError;
use compliance_core::ThrottleEntry;
use compliance_core::ThrottleKey;
use compliance_core::ThrottleStore;
use compliance_core::Timestamp;
use compliance_core::UserId;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
pub const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Signature columns in row-mapping order.
const SIGNATURE_COLUMNS: &str = "id, enrollment_id, user_id, signature_type, signature_meaning, \
                                 signer_name, signer_title, signature_data, signature_hash, \
                                 is_valid, signed_at, invalidated_at, invalidated_by, \
                                 invalidation_reason";

/// Audit columns in row-mapping order.
const AUDIT_COLUMNS: &str = "id, actor_id, action, resource_type, resource_id, old_values, \
                             new_values, success, error_message, ip_address, user_agent, \
                             created_at";

/// Tables, indexes, and immutability triggers.
const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS signatures (
        id TEXT PRIMARY KEY,
        enrollment_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        signature_type TEXT NOT NULL,
        signature_meaning TEXT NOT NULL,
        signer_name TEXT NOT NULL,
        signer_title TEXT,
        signature_data TEXT NOT NULL,
        signature_hash TEXT NOT NULL,
        is_valid INTEGER NOT NULL DEFAULT 1,
        signed_at INTEGER NOT NULL,
        invalidated_at INTEGER,
        invalidated_by TEXT,
        invalidation_reason TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_signatures_enrollment ON signatures (enrollment_id);
    CREATE INDEX IF NOT EXISTS idx_signatures_user ON signatures (user_id);
    CREATE TABLE IF NOT EXISTS audit_logs (
        id TEXT PRIMARY KEY,
        actor_id TEXT,
        action TEXT NOT NULL,
        resource_type TEXT NOT NULL,
        resource_id TEXT,
        old_values TEXT,
        new_values TEXT,
        success INTEGER NOT NULL,
        error_message TEXT,
        ip_address TEXT,
        user_agent TEXT,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_audit_logs_created_at ON audit_logs (created_at);
    CREATE INDEX IF NOT EXISTS idx_audit_logs_actor ON audit_logs (actor_id);
    CREATE INDEX IF NOT EXISTS idx_audit_logs_resource ON audit_logs (resource_type, resource_id);
    CREATE TABLE IF NOT EXISTS throttle_entries (
        key TEXT PRIMARY KEY,
        attempts INTEGER NOT NULL,
        window_start INTEGER NOT NULL,
        blocked_until INTEGER
    );";

/// Triggers recreated on every open.
const TRIGGERS_SQL: &str = "
    CREATE TRIGGER IF NOT EXISTS signatures_no_delete
        BEFORE DELETE ON signatures
        BEGIN SELECT RAISE(ABORT, 'signatures cannot be deleted'); END;
    CREATE TRIGGER IF NOT EXISTS signatures_invalid_is_final
        BEFORE UPDATE ON signatures WHEN OLD.is_valid = 0 OR NEW.is_valid <> 0
        BEGIN SELECT RAISE(ABORT, 'signature invalidation is final'); END;
    CREATE TRIGGER IF NOT EXISTS signatures_content_is_immutable
        BEFORE UPDATE OF id, enrollment_id, user_id, signature_type, signature_meaning,
            signer_name, signer_title, signature_data, signature_hash, signed_at
        ON signatures
        BEGIN SELECT RAISE(ABORT, 'signature content is immutable'); END;
    CREATE TRIGGER IF NOT EXISTS audit_logs_no_update
        BEFORE UPDATE ON audit_logs
        BEGIN SELECT RAISE(ABORT, 'audit log entries are immutable'); END;
    CREATE TRIGGER IF NOT EXISTS audit_logs_no_delete
        BEFORE DELETE ON audit_logs
        BEGIN SELECT RAISE(ABORT, 'audit log entries cannot be deleted'); END;";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` compliance store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored row failed to decode.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store input.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

/// Maps a `rusqlite` error into a store error.
#[allow(clippy::needless_pass_by_value, reason = "Used directly as a map_err adapter.")]
fn db(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed compliance store with WAL support.
///
/// Connection access is serialized through a mutex; cross-process writers
/// are serialized by `SQLite` locking.
#[derive(Clone)]
pub struct SqliteComplianceStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteComplianceStore {
    /// Opens an `SQLite`-backed compliance store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized, or carries another schema version.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Lists signatures where `column` equals `value`, newest first.
    fn list_signatures(
        &self,
        column: &str,
        value: &str,
        filter: SignatureFilter,
    ) -> Result<Vec<ElectronicSignature>, SqliteStoreError> {
        let validity = match filter {
            SignatureFilter::ValidOnly => " AND is_valid = 1",
            SignatureFilter::IncludeInvalid => "",
        };
        let sql = format!(
            "SELECT {SIGNATURE_COLUMNS} FROM signatures WHERE {column} = ?1{validity} ORDER BY \
             signed_at DESC, rowid DESC"
        );
        let guard = self.lock()?;
        let mut stmt = guard.prepare(&sql).map_err(db)?;
        let rows = stmt
            .query_map(params![value], SignatureRow::from_row)
            .map_err(db)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db)?;
        drop(stmt);
        drop(guard);
        rows.into_iter().map(SignatureRow::into_signature).collect()
    }

    /// Loads one signature with an open connection.
    fn load_signature(
        connection: &Connection,
        id: &SignatureId,
    ) -> Result<Option<ElectronicSignature>, SqliteStoreError> {
        let row = connection
            .query_row(
                &format!("SELECT {SIGNATURE_COLUMNS} FROM signatures WHERE id = ?1"),
                params![id.as_str()],
                SignatureRow::from_row,
            )
            .optional()
            .map_err(db)?;
        row.map(SignatureRow::into_signature).transpose()
    }

    /// Inserts a signature row.
    fn insert_signature(
        &self,
        record: NewSignatureRecord,
    ) -> Result<ElectronicSignature, SqliteStoreError> {
        let signature = record.into_signature(SignatureId::generate());
        let data = serde_json::to_string(&signature.signature_data)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO signatures (id, enrollment_id, user_id, signature_type, \
                 signature_meaning, signer_name, signer_title, signature_data, signature_hash, \
                 is_valid, signed_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10)",
                params![
                    signature.id.as_str(),
                    signature.enrollment_id.as_str(),
                    signature.user_id.as_str(),
                    signature.signature_type.label(),
                    signature.signature_meaning,
                    signature.signer_name,
                    signature.signer_title,
                    data,
                    signature.signature_hash,
                    signature.signed_at.as_unix_millis(),
                ],
            )
            .map_err(db)?;
        drop(guard);
        Ok(signature)
    }

    /// Applies a conditional invalidation inside one immediate transaction.
    fn invalidate_signature(
        &self,
        id: &SignatureId,
        invalidation: &SignatureInvalidation,
    ) -> Result<InvalidationOutcome, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db)?;
        let is_valid: Option<bool> = tx
            .query_row("SELECT is_valid FROM signatures WHERE id = ?1", params![id.as_str()], |row| {
                row.get(0)
            })
            .optional()
            .map_err(db)?;
        let outcome = match is_valid {
            None => InvalidationOutcome::NotFound,
            Some(false) => InvalidationOutcome::AlreadyInvalid,
            Some(true) => {
                tx.execute(
                    "UPDATE signatures SET is_valid = 0, invalidated_at = ?2, invalidated_by = \
                     ?3, invalidation_reason = ?4 WHERE id = ?1 AND is_valid = 1",
                    params![
                        id.as_str(),
                        invalidation.invalidated_at.as_unix_millis(),
                        invalidation.invalidated_by.as_str(),
                        invalidation.reason,
                    ],
                )
                .map_err(db)?;
                let updated = Self::load_signature(&tx, id)?.ok_or_else(|| {
                    SqliteStoreError::Corrupt(format!("signature {id} vanished during update"))
                })?;
                InvalidationOutcome::Applied(updated)
            }
        };
        tx.commit().map_err(db)?;
        drop(guard);
        Ok(outcome)
    }

    /// Aggregates signature counts.
    fn signature_statistics(&self) -> Result<SignatureStatistics, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT signature_type, is_valid, COUNT(*) FROM signatures GROUP BY \
                 signature_type, is_valid",
            )
            .map_err(db)?;
        let groups = stmt
            .query_map(params![], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?, row.get::<_, i64>(2)?))
            })
            .map_err(db)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db)?;
        drop(stmt);
        drop(guard);
        let mut stats = SignatureStatistics::default();
        for (label, is_valid, count) in groups {
            let signature_type = parse_signature_type(&label)?;
            let count = u64::try_from(count)
                .map_err(|_| SqliteStoreError::Corrupt("negative signature count".to_string()))?;
            stats.record_many(signature_type, is_valid, count);
        }
        Ok(stats)
    }

    /// Inserts an audit row.
    fn insert_audit(
        &self,
        entry: NewAuditEntry,
        created_at: Timestamp,
    ) -> Result<AuditLogEntry, SqliteStoreError> {
        let stored = entry.into_entry(AuditEntryId::generate(), created_at);
        let old_values = json_column(stored.old_values.as_ref())?;
        let new_values = json_column(stored.new_values.as_ref())?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO audit_logs (id, actor_id, action, resource_type, resource_id, \
                 old_values, new_values, success, error_message, ip_address, user_agent, \
                 created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    stored.id.as_str(),
                    stored.actor_id.as_ref().map(UserId::as_str),
                    stored.action,
                    stored.resource_type,
                    stored.resource_id,
                    old_values,
                    new_values,
                    stored.success,
                    stored.error_message,
                    stored.client.ip_address,
                    stored.client.user_agent,
                    stored.created_at.as_unix_millis(),
                ],
            )
            .map_err(db)?;
        drop(guard);
        Ok(stored)
    }

    /// Runs a filtered, paginated audit query.
    fn query_audit(&self, query: &AuditQuery) -> Result<AuditPage, SqliteStoreError> {
        let (where_sql, mut values) = audit_filter(query);
        let guard = self.lock()?;
        let total: i64 = guard
            .query_row(
                &format!("SELECT COUNT(*) FROM audit_logs{where_sql}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )
            .map_err(db)?;
        values.push(SqlValue::Integer(i64::from(query.limit)));
        values.push(SqlValue::Integer(i64::try_from(query.offset).unwrap_or(i64::MAX)));
        let mut stmt = guard
            .prepare(&format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_logs{where_sql} ORDER BY created_at DESC, \
                 rowid DESC LIMIT ? OFFSET ?"
            ))
            .map_err(db)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), AuditRow::from_row)
            .map_err(db)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db)?;
        drop(stmt);
        drop(guard);
        let entries = rows.into_iter().map(AuditRow::into_entry).collect::<Result<Vec<_>, _>>()?;
        Ok(AuditPage {
            entries,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    /// Loads one throttle entry with an open connection.
    fn load_throttle(
        connection: &Connection,
        key: &ThrottleKey,
    ) -> Result<Option<ThrottleEntry>, SqliteStoreError> {
        let row = connection
            .query_row(
                "SELECT attempts, window_start, blocked_until FROM throttle_entries WHERE key = ?1",
                params![key.as_str()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(db)?;
        row.map(|(attempts, window_start, blocked_until)| {
            throttle_entry(key, attempts, window_start, blocked_until)
        })
        .transpose()
    }

    /// Writes or removes one throttle entry with an open connection.
    fn store_throttle(
        connection: &Connection,
        key: &ThrottleKey,
        entry: Option<ThrottleEntry>,
    ) -> Result<(), SqliteStoreError> {
        match entry {
            Some(entry) => connection
                .execute(
                    "INSERT INTO throttle_entries (key, attempts, window_start, blocked_until) \
                     VALUES (?1, ?2, ?3, ?4) ON CONFLICT(key) DO UPDATE SET attempts = \
                     excluded.attempts, window_start = excluded.window_start, blocked_until = \
                     excluded.blocked_until",
                    params![
                        key.as_str(),
                        i64::from(entry.attempts),
                        entry.window_start.as_unix_millis(),
                        entry.blocked_until.map(Timestamp::as_unix_millis),
                    ],
                )
                .map_err(db)?,
            None => connection
                .execute("DELETE FROM throttle_entries WHERE key = ?1", params![key.as_str()])
                .map_err(db)?,
        };
        Ok(())
    }
}

// ============================================================================
// SECTION: Interface Implementations
// ============================================================================

impl SignatureStore for SqliteComplianceStore {
    fn insert(&self, record: NewSignatureRecord) -> Result<ElectronicSignature, StoreError> {
        self.insert_signature(record).map_err(StoreError::from)
    }

    fn get(&self, id: &SignatureId) -> Result<Option<ElectronicSignature>, StoreError> {
        let guard = self.lock()?;
        Self::load_signature(&guard, id).map_err(StoreError::from)
    }

    fn list_by_enrollment(
        &self,
        enrollment_id: &EnrollmentId,
        filter: SignatureFilter,
    ) -> Result<Vec<ElectronicSignature>, StoreError> {
        self.list_signatures("enrollment_id", enrollment_id.as_str(), filter)
            .map_err(StoreError::from)
    }

    fn list_by_user(
        &self,
        user_id: &UserId,
        filter: SignatureFilter,
    ) -> Result<Vec<ElectronicSignature>, StoreError> {
        self.list_signatures("user_id", user_id.as_str(), filter).map_err(StoreError::from)
    }

    fn invalidate(
        &self,
        id: &SignatureId,
        invalidation: &SignatureInvalidation,
    ) -> Result<InvalidationOutcome, StoreError> {
        self.invalidate_signature(id, invalidation).map_err(StoreError::from)
    }

    fn statistics(&self) -> Result<SignatureStatistics, StoreError> {
        self.signature_statistics().map_err(StoreError::from)
    }
}

impl AuditLogStore for SqliteComplianceStore {
    fn insert(
        &self,
        entry: NewAuditEntry,
        created_at: Timestamp,
    ) -> Result<AuditLogEntry, StoreError> {
        self.insert_audit(entry, created_at).map_err(StoreError::from)
    }

    fn query(&self, query: &AuditQuery) -> Result<AuditPage, StoreError> {
        self.query_audit(query).map_err(StoreError::from)
    }
}

impl ThrottleStore for SqliteComplianceStore {
    fn get(&self, key: &ThrottleKey) -> Result<Option<ThrottleEntry>, StoreError> {
        let guard = self.lock()?;
        Self::load_throttle(&guard, key).map_err(StoreError::from)
    }

    fn put(&self, key: &ThrottleKey, entry: ThrottleEntry) -> Result<(), StoreError> {
        let guard = self.lock()?;
        Self::store_throttle(&guard, key, Some(entry)).map_err(StoreError::from)
    }

    fn delete(&self, key: &ThrottleKey) -> Result<(), StoreError> {
        let guard = self.lock()?;
        Self::store_throttle(&guard, key, None).map_err(StoreError::from)
    }

    fn update(
        &self,
        key: &ThrottleKey,
        apply: &mut dyn FnMut(Option<ThrottleEntry>) -> Option<ThrottleEntry>,
    ) -> Result<Option<ThrottleEntry>, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db)?;
        let next = apply(Self::load_throttle(&tx, key)?);
        Self::store_throttle(&tx, key, next)?;
        tx.commit().map_err(db)?;
        drop(guard);
        Ok(next)
    }

    fn purge(
        &self,
        prefix: &str,
        is_stale: &dyn Fn(&ThrottleKey, &ThrottleEntry) -> bool,
    ) -> Result<usize, StoreError> {
        let (sql, bounds) = match prefix_upper_bound(prefix) {
            Some(upper) => (
                "SELECT key, attempts, window_start, blocked_until FROM throttle_entries \
                 WHERE key >= ?1 AND key < ?2",
                vec![prefix.to_string(), upper],
            ),
            None => (
                "SELECT key, attempts, window_start, blocked_until FROM throttle_entries \
                 WHERE substr(key, 1, length(?1)) = ?1",
                vec![prefix.to_string()],
            ),
        };
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db)?;
        let rows = {
            let mut stmt = tx.prepare(sql).map_err(db)?;
            stmt.query_map(params_from_iter(bounds.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            })
            .map_err(db)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db)?
        };
        let mut removed = 0;
        for (raw_key, attempts, window_start, blocked_until) in rows {
            let key = ThrottleKey::from_raw(raw_key);
            let entry = throttle_entry(&key, attempts, window_start, blocked_until)?;
            if is_stale(&key, &entry) {
                Self::store_throttle(&tx, &key, None)?;
                removed += 1;
            }
        }
        tx.commit().map_err(db)?;
        drop(guard);
        Ok(removed)
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw signature columns as read from `SQLite`.
struct SignatureRow {
    /// Signature identifier.
    id: String,
    /// Enrollment identifier.
    enrollment_id: String,
    /// Signing user.
    user_id: String,
    /// Signature type label.
    signature_type: String,
    /// Meaning statement.
    signature_meaning: String,
    /// Signer name.
    signer_name: String,
    /// Signer title.
    signer_title: Option<String>,
    /// Payload JSON text.
    signature_data: String,
    /// Stored digest.
    signature_hash: String,
    /// Validity flag.
    is_valid: bool,
    /// Capture time.
    signed_at: i64,
    /// Invalidation time.
    invalidated_at: Option<i64>,
    /// Invalidating user.
    invalidated_by: Option<String>,
    /// Invalidation reason.
    invalidation_reason: Option<String>,
}

impl SignatureRow {
    /// Reads columns in [`SIGNATURE_COLUMNS`] order.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            enrollment_id: row.get(1)?,
            user_id: row.get(2)?,
            signature_type: row.get(3)?,
            signature_meaning: row.get(4)?,
            signer_name: row.get(5)?,
            signer_title: row.get(6)?,
            signature_data: row.get(7)?,
            signature_hash: row.get(8)?,
            is_valid: row.get(9)?,
            signed_at: row.get(10)?,
            invalidated_at: row.get(11)?,
            invalidated_by: row.get(12)?,
            invalidation_reason: row.get(13)?,
        })
    }

    /// Decodes the row into a signature.
    fn into_signature(self) -> Result<ElectronicSignature, SqliteStoreError> {
        let signature_type = parse_signature_type(&self.signature_type)?;
        let data: Value = serde_json::from_str(&self.signature_data).map_err(|err| {
            SqliteStoreError::Corrupt(format!("signature {} data: {err}", self.id))
        })?;
        let signature_data = SignaturePayload::from_value(data).ok_or_else(|| {
            SqliteStoreError::Corrupt(format!("signature {} data is not an object", self.id))
        })?;
        let invalidation = match (self.invalidated_at, self.invalidated_by, self.invalidation_reason)
        {
            (Some(at), Some(by), Some(reason)) => Some(SignatureInvalidation {
                invalidated_at: Timestamp::from_unix_millis(at),
                invalidated_by: UserId::new(by),
                reason,
            }),
            (None, None, None) => None,
            _ => {
                return Err(SqliteStoreError::Corrupt(format!(
                    "signature {} has partial invalidation fields",
                    self.id
                )));
            }
        };
        if self.is_valid == invalidation.is_some() {
            return Err(SqliteStoreError::Corrupt(format!(
                "signature {} validity disagrees with invalidation fields",
                self.id
            )));
        }
        Ok(ElectronicSignature {
            id: SignatureId::new(self.id),
            enrollment_id: EnrollmentId::new(self.enrollment_id),
            user_id: UserId::new(self.user_id),
            signature_type,
            signature_meaning: self.signature_meaning,
            signer_name: self.signer_name,
            signer_title: self.signer_title,
            signature_data,
            signature_hash: self.signature_hash,
            is_valid: self.is_valid,
            signed_at: Timestamp::from_unix_millis(self.signed_at),
            invalidation,
        })
    }
}

/// Raw audit columns as read from `SQLite`.
struct AuditRow {
    /// Entry identifier.
    id: String,
    /// Acting user.
    actor_id: Option<String>,
    /// Action label.
    action: String,
    /// Resource type.
    resource_type: String,
    /// Resource identifier.
    resource_id: Option<String>,
    /// Before snapshot JSON text.
    old_values: Option<String>,
    /// After snapshot JSON text.
    new_values: Option<String>,
    /// Success flag.
    success: bool,
    /// Failure message.
    error_message: Option<String>,
    /// Client IP address.
    ip_address: Option<String>,
    /// Client user agent.
    user_agent: Option<String>,
    /// Write time.
    created_at: i64,
}

impl AuditRow {
    /// Reads columns in [`AUDIT_COLUMNS`] order.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            actor_id: row.get(1)?,
            action: row.get(2)?,
            resource_type: row.get(3)?,
            resource_id: row.get(4)?,
            old_values: row.get(5)?,
            new_values: row.get(6)?,
            success: row.get(7)?,
            error_message: row.get(8)?,
            ip_address: row.get(9)?,
            user_agent: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    /// Decodes the row into an audit entry.
    fn into_entry(self) -> Result<AuditLogEntry, SqliteStoreError> {
        let old_values = parse_json_column(&self.id, self.old_values.as_deref())?;
        let new_values = parse_json_column(&self.id, self.new_values.as_deref())?;
        Ok(AuditLogEntry {
            id: AuditEntryId::new(self.id),
            actor_id: self.actor_id.map(UserId::new),
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            old_values,
            new_values,
            success: self.success,
            error_message: self.error_message,
            created_at: Timestamp::from_unix_millis(self.created_at),
            client: ClientMetadata {
                ip_address: self.ip_address,
                user_agent: self.user_agent,
            },
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the WHERE clause and bound values for an audit query.
fn audit_filter(query: &AuditQuery) -> (String, Vec<SqlValue>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<SqlValue> = Vec::new();
    if let Some(actor_id) = &query.actor_id {
        clauses.push("actor_id = ?".to_string());
        values.push(SqlValue::Text(actor_id.as_str().to_string()));
    }
    if !query.actions.is_empty() {
        let placeholders = vec!["?"; query.actions.len()].join(", ");
        clauses.push(format!("action IN ({placeholders})"));
        values.extend(query.actions.iter().cloned().map(SqlValue::Text));
    }
    if let Some(resource_type) = &query.resource_type {
        clauses.push("resource_type = ?".to_string());
        values.push(SqlValue::Text(resource_type.clone()));
    }
    if let Some(resource_id) = &query.resource_id {
        clauses.push("resource_id = ?".to_string());
        values.push(SqlValue::Text(resource_id.clone()));
    }
    if let Some(success) = query.success {
        clauses.push("success = ?".to_string());
        values.push(SqlValue::Integer(i64::from(success)));
    }
    if let Some(since) = query.since {
        clauses.push("created_at >= ?".to_string());
        values.push(SqlValue::Integer(since.as_unix_millis()));
    }
    if let Some(until) = query.until {
        clauses.push("created_at <= ?".to_string());
        values.push(SqlValue::Integer(until.as_unix_millis()));
    }
    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

/// Serializes an optional JSON column.
fn json_column(value: Option<&Value>) -> Result<Option<String>, SqliteStoreError> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Parses an optional JSON column.
fn parse_json_column(id: &str, text: Option<&str>) -> Result<Option<Value>, SqliteStoreError> {
    text.map(serde_json::from_str)
        .transpose()
        .map_err(|err| SqliteStoreError::Corrupt(format!("audit entry {id} json: {err}")))
}

/// Parses a stored signature type label.
fn parse_signature_type(label: &str) -> Result<SignatureType, SqliteStoreError> {
    SignatureType::from_label(label)
        .ok_or_else(|| SqliteStoreError::Corrupt(format!("unknown signature type: {label}")))
}

/// Returns the smallest key greater than every key starting with `prefix`.
///
/// Keys compare bytewise, which matches code point order, so bumping the last
/// bumpable character yields the end of the prefix range. Returns `None` when
/// no such key exists, including for an empty prefix.
fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        if let Some(next) = char::from_u32(u32::from(last) + 1) {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

/// Decodes raw throttle columns.
fn throttle_entry(
    key: &ThrottleKey,
    attempts: i64,
    window_start: i64,
    blocked_until: Option<i64>,
) -> Result<ThrottleEntry, SqliteStoreError> {
    let attempts = u32::try_from(attempts)
        .map_err(|_| SqliteStoreError::Corrupt(format!("invalid attempts for {key}")))?;
    Ok(ThrottleEntry {
        attempts,
        window_start: Timestamp::from_unix_millis(window_start),
        blocked_until: blocked_until.map(Timestamp::from_unix_millis),
    })
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db)?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms)).map_err(db)?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db)?;
            tx.execute_batch(SCHEMA_SQL).map_err(db)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.execute_batch(TRIGGERS_SQL).map_err(db)?;
    tx.commit().map_err(db)?;
    Ok(())
}
