// crates/compliance-core/src/core/mod.rs
// ============================================================================
// Module: Compliance Core Types
// Description: Canonical data model for signatures, audit entries, and throttling.
// Purpose: Provide stable, serializable types shared by services and stores.
// Dependencies: serde, serde_json, sha2
// ============================================================================

//! ## Overview
//! Core types define electronic signatures, audit log entries, throttle
//! entries, and the payload hashing used for tamper evidence. These types are
//! the source of truth for every store backend and for the CLI output.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod hashing;
pub mod identifiers;
pub mod signature;
pub mod throttle;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditLogEntry;
pub use audit::AuditPage;
pub use audit::AuditQuery;
pub use audit::DEFAULT_AUDIT_PAGE_SIZE;
pub use audit::MAX_AUDIT_PAGE_SIZE;
pub use audit::NewAuditEntry;
pub use audit::actions;
pub use audit::resources;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use hashing::digest_payload;
pub use identifiers::AuditEntryId;
pub use identifiers::EnrollmentId;
pub use identifiers::SignatureId;
pub use identifiers::UserId;
pub use signature::ClientMetadata;
pub use signature::DEFAULT_MAX_MEANING_LENGTH;
pub use signature::DEFAULT_MAX_PAYLOAD_BYTES;
pub use signature::ElectronicSignature;
pub use signature::InvalidationOutcome;
pub use signature::NewSignatureRecord;
pub use signature::REASON_INTEGRITY_COMPROMISED;
pub use signature::REASON_NOT_FOUND;
pub use signature::SignatureFilter;
pub use signature::SignatureInvalidation;
pub use signature::SignatureLimits;
pub use signature::SignaturePayload;
pub use signature::SignatureRequest;
pub use signature::SignatureStatistics;
pub use signature::SignatureType;
pub use signature::SignatureValidationError;
pub use signature::SignatureVerification;
pub use signature::VerificationStatus;
pub use throttle::ACTION_LOGIN;
pub use throttle::ACTION_RESEND_VERIFICATION;
pub use throttle::ACTION_SIGNUP;
pub use throttle::ThrottleDecision;
pub use throttle::ThrottleEntry;
pub use throttle::ThrottleKey;
pub use throttle::ThrottlePolicy;
pub use throttle::ThrottleState;
pub use throttle::apply_attempt;
pub use time::Timestamp;
