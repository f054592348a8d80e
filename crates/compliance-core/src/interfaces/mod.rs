// crates/compliance-core/src/interfaces/mod.rs
// ============================================================================
// Module: Compliance Interfaces
// Description: Backend-agnostic persistence, clock, and client environment contracts.
// Purpose: Define the collaborator surfaces the compliance services depend on.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The compliance services own no storage. They talk to collaborators through
//! the traits in this module: a signature store, an insert-only audit log
//! store, a keyed throttle store, a clock, and a client environment that
//! supplies best-effort device context. Implementations must fail closed and
//! report errors rather than fabricate data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::AuditLogEntry;
use crate::core::AuditPage;
use crate::core::AuditQuery;
use crate::core::ElectronicSignature;
use crate::core::EnrollmentId;
use crate::core::InvalidationOutcome;
use crate::core::NewAuditEntry;
use crate::core::NewSignatureRecord;
use crate::core::SignatureFilter;
use crate::core::SignatureId;
use crate::core::SignatureInvalidation;
use crate::core::SignatureStatistics;
use crate::core::ThrottleEntry;
use crate::core::ThrottleKey;
use crate::core::Timestamp;
use crate::core::UserId;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Persistence collaborator errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("compliance store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("compliance store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("compliance store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("compliance store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("compliance store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Signature Store
// ============================================================================

/// Persistence for electronic signatures.
///
/// There is no delete operation. The only mutation is [`Self::invalidate`],
/// which must apply atomically and only to a currently valid row.
pub trait SignatureStore: Send + Sync {
    /// Inserts a new valid signature and returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert is rejected.
    fn insert(&self, record: NewSignatureRecord) -> Result<ElectronicSignature, StoreError>;

    /// Loads a signature by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get(&self, id: &SignatureId) -> Result<Option<ElectronicSignature>, StoreError>;

    /// Lists signatures for an enrollment, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_by_enrollment(
        &self,
        enrollment_id: &EnrollmentId,
        filter: SignatureFilter,
    ) -> Result<Vec<ElectronicSignature>, StoreError>;

    /// Lists signatures for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_by_user(
        &self,
        user_id: &UserId,
        filter: SignatureFilter,
    ) -> Result<Vec<ElectronicSignature>, StoreError>;

    /// Flips a valid signature to invalid with the supplied details.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn invalidate(
        &self,
        id: &SignatureId,
        invalidation: &SignatureInvalidation,
    ) -> Result<InvalidationOutcome, StoreError>;

    /// Counts signatures by validity and type across all rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the aggregate fails.
    fn statistics(&self) -> Result<SignatureStatistics, StoreError>;
}

// ============================================================================
// SECTION: Audit Log Store
// ============================================================================

/// Insert-only persistence for audit entries.
pub trait AuditLogStore: Send + Sync {
    /// Appends one entry stamped with `created_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert is rejected.
    fn insert(
        &self,
        entry: NewAuditEntry,
        created_at: Timestamp,
    ) -> Result<AuditLogEntry, StoreError>;

    /// Returns one page of matching entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn query(&self, query: &AuditQuery) -> Result<AuditPage, StoreError>;
}

// ============================================================================
// SECTION: Throttle Store
// ============================================================================

/// Keyed storage for throttle entries.
///
/// [`Self::update`] must run the read-modify-write under a single lock or
/// transaction so concurrent attempts cannot both observe a stale count.
pub trait ThrottleStore: Send + Sync {
    /// Loads the entry for a key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get(&self, key: &ThrottleKey) -> Result<Option<ThrottleEntry>, StoreError>;

    /// Stores the entry for a key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn put(&self, key: &ThrottleKey, entry: ThrottleEntry) -> Result<(), StoreError>;

    /// Removes the entry for a key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete(&self, key: &ThrottleKey) -> Result<(), StoreError>;

    /// Atomically replaces the entry for a key with `apply(current)`.
    ///
    /// Returning `None` from `apply` removes the entry. The stored result is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read or write fails.
    fn update(
        &self,
        key: &ThrottleKey,
        apply: &mut dyn FnMut(Option<ThrottleEntry>) -> Option<ThrottleEntry>,
    ) -> Result<Option<ThrottleEntry>, StoreError>;

    /// Removes every entry whose key starts with `prefix` and for which
    /// `is_stale` returns true, and returns the count.
    ///
    /// Entries outside `prefix` are neither loaded nor passed to `is_stale`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the sweep fails.
    fn purge(
        &self,
        prefix: &str,
        is_stale: &dyn Fn(&ThrottleKey, &ThrottleEntry) -> bool,
    ) -> Result<usize, StoreError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

// ============================================================================
// SECTION: Client Environment
// ============================================================================

/// Best-effort device and network context for the signing client.
///
/// Values enrich the signature payload for forensic review; their quality as
/// identifiers is outside this subsystem's control.
pub trait ClientEnvironment: Send + Sync {
    /// Returns a device/browser fingerprint string.
    fn device_fingerprint(&self) -> Option<String>;

    /// Returns the client IP address.
    fn ip_address(&self) -> Option<String>;

    /// Returns the client user agent.
    fn user_agent(&self) -> Option<String>;
}
