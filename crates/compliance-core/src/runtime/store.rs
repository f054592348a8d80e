// crates/compliance-core/src/runtime/store.rs
// ============================================================================
// Module: Compliance In-Memory Stores
// Description: Mutex-guarded in-memory signature, audit, and throttle stores.
// Purpose: Provide deterministic store implementations without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! These stores back tests, demos, and single-process deployments. Each one
//! guards its whole map with a single mutex, so every read-modify-write is
//! atomic within the process. They are not durable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::AuditEntryId;
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
use crate::interfaces::AuditLogStore;
use crate::interfaces::SignatureStore;
use crate::interfaces::StoreError;
use crate::interfaces::ThrottleStore;

// ============================================================================
// SECTION: Signature Store
// ============================================================================

/// In-memory signature store; rows are kept in insertion order.
#[derive(Debug, Default, Clone)]
pub struct InMemorySignatureStore {
    /// Signature rows protected by a mutex.
    rows: Arc<Mutex<Vec<ElectronicSignature>>>,
}

impl InMemorySignatureStore {
    /// Creates an empty signature store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns matching rows newest first.
    fn list_where(
        &self,
        filter: SignatureFilter,
        predicate: impl Fn(&ElectronicSignature) -> bool,
    ) -> Result<Vec<ElectronicSignature>, StoreError> {
        let mut rows: Vec<ElectronicSignature> = {
            let guard = self.rows.lock().map_err(|_| poisoned("signature store"))?;
            guard
                .iter()
                .rev()
                .filter(|row| predicate(row) && filter.includes(row))
                .cloned()
                .collect()
        };
        rows.sort_by(|a, b| b.signed_at.cmp(&a.signed_at));
        Ok(rows)
    }
}

impl SignatureStore for InMemorySignatureStore {
    fn insert(&self, record: NewSignatureRecord) -> Result<ElectronicSignature, StoreError> {
        let signature = record.into_signature(SignatureId::generate());
        self.rows.lock().map_err(|_| poisoned("signature store"))?.push(signature.clone());
        Ok(signature)
    }

    fn get(&self, id: &SignatureId) -> Result<Option<ElectronicSignature>, StoreError> {
        let guard = self.rows.lock().map_err(|_| poisoned("signature store"))?;
        Ok(guard.iter().find(|row| row.id == *id).cloned())
    }

    fn list_by_enrollment(
        &self,
        enrollment_id: &EnrollmentId,
        filter: SignatureFilter,
    ) -> Result<Vec<ElectronicSignature>, StoreError> {
        self.list_where(filter, |row| row.enrollment_id == *enrollment_id)
    }

    fn list_by_user(
        &self,
        user_id: &UserId,
        filter: SignatureFilter,
    ) -> Result<Vec<ElectronicSignature>, StoreError> {
        self.list_where(filter, |row| row.user_id == *user_id)
    }

    fn invalidate(
        &self,
        id: &SignatureId,
        invalidation: &SignatureInvalidation,
    ) -> Result<InvalidationOutcome, StoreError> {
        let mut guard = self.rows.lock().map_err(|_| poisoned("signature store"))?;
        let Some(row) = guard.iter_mut().find(|row| row.id == *id) else {
            return Ok(InvalidationOutcome::NotFound);
        };
        if !row.is_valid {
            return Ok(InvalidationOutcome::AlreadyInvalid);
        }
        row.is_valid = false;
        row.invalidation = Some(invalidation.clone());
        Ok(InvalidationOutcome::Applied(row.clone()))
    }

    fn statistics(&self) -> Result<SignatureStatistics, StoreError> {
        let guard = self.rows.lock().map_err(|_| poisoned("signature store"))?;
        let mut stats = SignatureStatistics::default();
        for row in guard.iter() {
            stats.record(row.signature_type, row.is_valid);
        }
        drop(guard);
        Ok(stats)
    }
}

// ============================================================================
// SECTION: Audit Log Store
// ============================================================================

/// In-memory insert-only audit log.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditLogStore {
    /// Audit entries in insertion order.
    entries: Arc<Mutex<Vec<AuditLogEntry>>>,
}

impl InMemoryAuditLogStore {
    /// Creates an empty audit log store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditLogStore for InMemoryAuditLogStore {
    fn insert(
        &self,
        entry: NewAuditEntry,
        created_at: Timestamp,
    ) -> Result<AuditLogEntry, StoreError> {
        let stored = entry.into_entry(AuditEntryId::generate(), created_at);
        self.entries.lock().map_err(|_| poisoned("audit log store"))?.push(stored.clone());
        Ok(stored)
    }

    fn query(&self, query: &AuditQuery) -> Result<AuditPage, StoreError> {
        let mut matches: Vec<AuditLogEntry> = {
            let guard = self.entries.lock().map_err(|_| poisoned("audit log store"))?;
            guard.iter().rev().filter(|entry| query.matches(entry)).cloned().collect()
        };
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = u64::try_from(matches.len()).unwrap_or(u64::MAX);
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        let entries = matches.into_iter().skip(offset).take(limit).collect();
        Ok(AuditPage {
            entries,
            total,
        })
    }
}

// ============================================================================
// SECTION: Throttle Store
// ============================================================================

/// In-memory throttle store guarded by one mutex.
#[derive(Debug, Default, Clone)]
pub struct InMemoryThrottleStore {
    /// Throttle entries keyed by `action:identifier`.
    entries: Arc<Mutex<BTreeMap<ThrottleKey, ThrottleEntry>>>,
}

impl InMemoryThrottleStore {
    /// Creates an empty throttle store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |guard| guard.len())
    }

    /// Returns true when no keys are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ThrottleStore for InMemoryThrottleStore {
    fn get(&self, key: &ThrottleKey) -> Result<Option<ThrottleEntry>, StoreError> {
        let guard = self.entries.lock().map_err(|_| poisoned("throttle store"))?;
        Ok(guard.get(key).copied())
    }

    fn put(&self, key: &ThrottleKey, entry: ThrottleEntry) -> Result<(), StoreError> {
        self.entries.lock().map_err(|_| poisoned("throttle store"))?.insert(key.clone(), entry);
        Ok(())
    }

    fn delete(&self, key: &ThrottleKey) -> Result<(), StoreError> {
        self.entries.lock().map_err(|_| poisoned("throttle store"))?.remove(key);
        Ok(())
    }

    fn update(
        &self,
        key: &ThrottleKey,
        apply: &mut dyn FnMut(Option<ThrottleEntry>) -> Option<ThrottleEntry>,
    ) -> Result<Option<ThrottleEntry>, StoreError> {
        let mut guard = self.entries.lock().map_err(|_| poisoned("throttle store"))?;
        let next = apply(guard.get(key).copied());
        match next {
            Some(entry) => {
                guard.insert(key.clone(), entry);
            }
            None => {
                guard.remove(key);
            }
        }
        drop(guard);
        Ok(next)
    }

    fn purge(
        &self,
        prefix: &str,
        is_stale: &dyn Fn(&ThrottleKey, &ThrottleEntry) -> bool,
    ) -> Result<usize, StoreError> {
        let mut guard = self.entries.lock().map_err(|_| poisoned("throttle store"))?;
        let before = guard.len();
        guard.retain(|key, entry| !(key.as_str().starts_with(prefix) && is_stale(key, entry)));
        let removed = before - guard.len();
        drop(guard);
        Ok(removed)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the error reported for a poisoned store mutex.
fn poisoned(store: &str) -> StoreError {
    StoreError::Store(format!("{store} mutex poisoned"))
}
