// crates/compliance-core/src/core/signature.rs
// ============================================================================
// Module: Electronic Signature Model
// Description: Signature records, requests, verification results, and statistics.
// Purpose: Provide the canonical data model for legally meaningful signatures.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! An [`ElectronicSignature`] binds a signer, an enrollment, a legal meaning
//! statement, and an opaque payload (drawing, timestamp, device metadata)
//! whose SHA-256 digest is stored alongside it.
//!
//! # Invariants
//! - `signature_hash` equals the payload digest at creation time.
//! - A signature is mutated only by invalidation, which is one-way; the
//!   invalidation fields are set together and never overwritten.
//! - Signatures are never deleted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::EnrollmentId;
use crate::core::identifiers::SignatureId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum signer name length in characters.
pub const MAX_SIGNER_NAME_LENGTH: usize = 256;
/// Maximum signer title length in characters.
pub const MAX_SIGNER_TITLE_LENGTH: usize = 256;
/// Maximum invalidation reason length in characters.
pub const MAX_INVALIDATION_REASON_LENGTH: usize = 1024;
/// Default maximum meaning statement length in characters.
pub const DEFAULT_MAX_MEANING_LENGTH: usize = 4096;
/// Default maximum canonical payload size in bytes.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Size limits applied to signature requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureLimits {
    /// Maximum meaning statement length in characters.
    pub max_meaning_length: usize,
    /// Maximum canonical payload size in bytes.
    pub max_payload_bytes: usize,
}

impl Default for SignatureLimits {
    fn default() -> Self {
        Self {
            max_meaning_length: DEFAULT_MAX_MEANING_LENGTH,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

// ============================================================================
// SECTION: Signature Type
// ============================================================================

/// Kind of assertion a signature records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureType {
    /// Signer attests to completing a training course.
    TrainingCompletion,
    /// Signer acknowledges a document or statement.
    Acknowledgment,
}

impl SignatureType {
    /// Every signature type, in storage order.
    pub const ALL: [Self; 2] = [Self::TrainingCompletion, Self::Acknowledgment];

    /// Returns the canonical storage label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::TrainingCompletion => "training_completion",
            Self::Acknowledgment => "acknowledgment",
        }
    }

    /// Parses a storage label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }
}

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Opaque structured signature payload (drawing, timestamp, device metadata).
///
/// The payload is always a JSON object; key order is preserved as inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignaturePayload(Map<String, Value>);

impl SignaturePayload {
    /// Creates an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wraps an existing JSON object.
    #[must_use]
    pub const fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Converts a JSON value into a payload when it is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Inserts or replaces a top-level field.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Returns a top-level field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns true when the payload has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the payload and returns the JSON object.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

// ============================================================================
// SECTION: Client Metadata
// ============================================================================

/// Best-effort client context conveyed by the UI layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    /// Client IP address when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Client user agent when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Inputs for creating a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRequest {
    /// Enrollment the signature is bound to.
    pub enrollment_id: EnrollmentId,
    /// Signing user.
    pub user_id: UserId,
    /// Kind of assertion.
    pub signature_type: SignatureType,
    /// Printed signer name.
    pub signer_name: String,
    /// Optional signer title.
    pub signer_title: Option<String>,
    /// Structured payload to fingerprint.
    pub signature_data: SignaturePayload,
    /// Legal statement the signer attests to.
    pub signature_meaning: String,
    /// Optional client context recorded in the audit trail.
    pub client: Option<ClientMetadata>,
}

impl SignatureRequest {
    /// Validates required fields and field lengths.
    ///
    /// Presence of a drawn signature inside the payload is a caller
    /// precondition and is not checked here.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureValidationError`] for blank or oversized fields.
    pub fn validate(&self, limits: &SignatureLimits) -> Result<(), SignatureValidationError> {
        if self.signer_name.trim().is_empty() {
            return Err(SignatureValidationError::BlankSignerName);
        }
        if self.signer_name.chars().count() > MAX_SIGNER_NAME_LENGTH {
            return Err(SignatureValidationError::SignerNameTooLong {
                max: MAX_SIGNER_NAME_LENGTH,
            });
        }
        if let Some(title) = &self.signer_title
            && title.chars().count() > MAX_SIGNER_TITLE_LENGTH
        {
            return Err(SignatureValidationError::SignerTitleTooLong {
                max: MAX_SIGNER_TITLE_LENGTH,
            });
        }
        if self.signature_meaning.trim().is_empty() {
            return Err(SignatureValidationError::BlankMeaning);
        }
        let meaning_length = self.signature_meaning.chars().count();
        if meaning_length > limits.max_meaning_length {
            return Err(SignatureValidationError::MeaningTooLong {
                max: limits.max_meaning_length,
                actual: meaning_length,
            });
        }
        if self.signature_data.is_empty() {
            return Err(SignatureValidationError::EmptyPayload);
        }
        Ok(())
    }
}

/// Validation failures for signature inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureValidationError {
    /// Signer name is empty or whitespace.
    #[error("signer name must not be blank")]
    BlankSignerName,
    /// Signer name exceeds the length limit.
    #[error("signer name exceeds {max} characters")]
    SignerNameTooLong {
        /// Maximum allowed characters.
        max: usize,
    },
    /// Signer title exceeds the length limit.
    #[error("signer title exceeds {max} characters")]
    SignerTitleTooLong {
        /// Maximum allowed characters.
        max: usize,
    },
    /// Meaning statement is empty or whitespace.
    #[error("signature meaning must not be blank")]
    BlankMeaning,
    /// Meaning statement exceeds the length limit.
    #[error("signature meaning is {actual} characters (max {max})")]
    MeaningTooLong {
        /// Maximum allowed characters.
        max: usize,
        /// Actual characters.
        actual: usize,
    },
    /// Payload has no fields.
    #[error("signature data must not be empty")]
    EmptyPayload,
    /// Canonical payload exceeds the size limit.
    #[error("signature data is {actual} bytes (max {max})")]
    PayloadTooLarge {
        /// Maximum allowed bytes.
        max: usize,
        /// Actual canonical bytes.
        actual: usize,
    },
    /// Invalidating user is empty or whitespace.
    #[error("invalidated_by must not be blank")]
    BlankInvalidatedBy,
    /// Invalidation reason is empty or whitespace.
    #[error("invalidation reason must not be blank")]
    BlankReason,
    /// Invalidation reason exceeds the length limit.
    #[error("invalidation reason exceeds {max} characters")]
    ReasonTooLong {
        /// Maximum allowed characters.
        max: usize,
    },
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Permanent invalidation details for a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInvalidation {
    /// When the signature was invalidated.
    pub invalidated_at: Timestamp,
    /// Who invalidated the signature.
    pub invalidated_by: UserId,
    /// Why the signature was invalidated.
    pub reason: String,
}

/// Signature row ready for insertion; the store assigns the identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSignatureRecord {
    /// Enrollment the signature is bound to.
    pub enrollment_id: EnrollmentId,
    /// Signing user.
    pub user_id: UserId,
    /// Kind of assertion.
    pub signature_type: SignatureType,
    /// Legal statement the signer attests to.
    pub signature_meaning: String,
    /// Printed signer name.
    pub signer_name: String,
    /// Optional signer title.
    pub signer_title: Option<String>,
    /// Structured payload.
    pub signature_data: SignaturePayload,
    /// Lowercase hex digest of the payload.
    pub signature_hash: String,
    /// Capture time.
    pub signed_at: Timestamp,
}

impl NewSignatureRecord {
    /// Builds the stored signature with the assigned identifier.
    #[must_use]
    pub fn into_signature(self, id: SignatureId) -> ElectronicSignature {
        ElectronicSignature {
            id,
            enrollment_id: self.enrollment_id,
            user_id: self.user_id,
            signature_type: self.signature_type,
            signature_meaning: self.signature_meaning,
            signer_name: self.signer_name,
            signer_title: self.signer_title,
            signature_data: self.signature_data,
            signature_hash: self.signature_hash,
            is_valid: true,
            signed_at: self.signed_at,
            invalidation: None,
        }
    }
}

/// Stored electronic signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectronicSignature {
    /// Signature identifier.
    pub id: SignatureId,
    /// Enrollment the signature is bound to.
    pub enrollment_id: EnrollmentId,
    /// Signing user.
    pub user_id: UserId,
    /// Kind of assertion.
    pub signature_type: SignatureType,
    /// Legal statement the signer attests to.
    pub signature_meaning: String,
    /// Printed signer name.
    pub signer_name: String,
    /// Optional signer title.
    pub signer_title: Option<String>,
    /// Structured payload.
    pub signature_data: SignaturePayload,
    /// Lowercase hex digest of the payload at creation time.
    pub signature_hash: String,
    /// False once invalidated.
    pub is_valid: bool,
    /// Capture time.
    pub signed_at: Timestamp,
    /// Invalidation details when `is_valid` is false.
    pub invalidation: Option<SignatureInvalidation>,
}

/// Result of a conditional invalidation at the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationOutcome {
    /// The flag flipped; contains the updated record.
    Applied(ElectronicSignature),
    /// No row exists for the identifier.
    NotFound,
    /// The row was already invalid; nothing changed.
    AlreadyInvalid,
}

// ============================================================================
// SECTION: Read Model
// ============================================================================

/// Listing filter for signature queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureFilter {
    /// Only signatures that are still valid.
    #[default]
    ValidOnly,
    /// Valid and invalidated signatures.
    IncludeInvalid,
}

impl SignatureFilter {
    /// Returns true when the signature passes the filter.
    #[must_use]
    pub const fn includes(self, signature: &ElectronicSignature) -> bool {
        match self {
            Self::ValidOnly => signature.is_valid,
            Self::IncludeInvalid => true,
        }
    }
}

/// Aggregate signature counts across all rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureStatistics {
    /// Total rows, including invalidated ones.
    pub total: u64,
    /// Rows still valid.
    pub valid: u64,
    /// Rows invalidated.
    pub invalid: u64,
    /// Rows per signature type.
    pub by_type: BTreeMap<SignatureType, u64>,
}

impl SignatureStatistics {
    /// Folds one row into the counts.
    pub fn record(&mut self, signature_type: SignatureType, is_valid: bool) {
        self.record_many(signature_type, is_valid, 1);
    }

    /// Folds `count` rows of the same shape into the counts.
    pub fn record_many(&mut self, signature_type: SignatureType, is_valid: bool, count: u64) {
        self.total += count;
        if is_valid {
            self.valid += count;
        } else {
            self.invalid += count;
        }
        *self.by_type.entry(signature_type).or_insert(0) += count;
    }
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Reason reported when a signature id does not exist.
pub const REASON_NOT_FOUND: &str = "signature not found";
/// Reason reported when the recomputed digest disagrees with the stored one.
pub const REASON_INTEGRITY_COMPROMISED: &str = "signature integrity compromised";

/// Verification outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Signature exists, is valid, and its payload digest matches.
    Valid,
    /// No signature exists for the identifier.
    NotFound,
    /// Signature was invalidated.
    Invalidated,
    /// Payload digest no longer matches the stored hash.
    IntegrityCompromised,
}

/// Verification result returned as data, never as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureVerification {
    /// Signature that was checked.
    pub signature_id: SignatureId,
    /// Outcome classification.
    pub status: VerificationStatus,
    /// Human-readable reason when not valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SignatureVerification {
    /// Returns true when the signature verified.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status == VerificationStatus::Valid
    }
}
