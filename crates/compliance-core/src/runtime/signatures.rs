// crates/compliance-core/src/runtime/signatures.rs
// ============================================================================
// Module: Signature Service
// Description: Creation, verification, and invalidation of electronic signatures.
// Purpose: Bind signer intent to a tamper-evident payload digest with an audit trail.
// Dependencies: crate::core, crate::interfaces, crate::runtime, serde_json
// ============================================================================

//! ## Overview
//! The service is the single writer of signature rows. Creation and
//! invalidation are primary operations and report persistence failures to
//! the caller. Their audit entries are best-effort notifications. Verification
//! never mutates state and returns its outcome as data.
//!
//! Security posture: the stored digest only proves the payload has not
//! changed since capture; it does not authenticate the signer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::ClientMetadata;
use crate::core::ElectronicSignature;
use crate::core::EnrollmentId;
use crate::core::HashError;
use crate::core::InvalidationOutcome;
use crate::core::NewSignatureRecord;
use crate::core::SignatureFilter;
use crate::core::SignatureId;
use crate::core::SignatureInvalidation;
use crate::core::SignatureLimits;
use crate::core::SignaturePayload;
use crate::core::SignatureRequest;
use crate::core::SignatureStatistics;
use crate::core::SignatureType;
use crate::core::SignatureValidationError;
use crate::core::SignatureVerification;
use crate::core::UserId;
use crate::core::VerificationStatus;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::canonical_payload_bytes;
use crate::core::hashing::digest_payload;
use crate::core::hashing::hash_bytes;
use crate::core::signature::MAX_INVALIDATION_REASON_LENGTH;
use crate::core::signature::REASON_INTEGRITY_COMPROMISED;
use crate::core::signature::REASON_NOT_FOUND;
use crate::interfaces::ClientEnvironment;
use crate::interfaces::Clock;
use crate::interfaces::SignatureStore;
use crate::interfaces::StoreError;
use crate::runtime::audit::AuditLogger;
use crate::runtime::telemetry::EVENT_SIGNATURE_INTEGRITY_FAILED;
use crate::runtime::telemetry::TelemetryEvent;
use crate::runtime::telemetry::TelemetrySink;

// ============================================================================
// SECTION: Payload Keys
// ============================================================================

/// Payload key holding the drawn signature.
pub const PAYLOAD_SIGNATURE_IMAGE: &str = "signature_image";
/// Payload key holding the capture time in unix milliseconds.
pub const PAYLOAD_SIGNED_AT: &str = "signed_at";
/// Payload key holding the client user agent.
pub const PAYLOAD_USER_AGENT: &str = "user_agent";
/// Payload key holding the device fingerprint.
pub const PAYLOAD_DEVICE_FINGERPRINT: &str = "device_fingerprint";
/// Payload key holding the client IP address.
pub const PAYLOAD_IP_ADDRESS: &str = "ip_address";

/// Telemetry component name.
const COMPONENT: &str = "signature_service";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Signature service errors.
///
/// Verification outcomes are never errors; see [`SignatureVerification`].
#[derive(Debug, Error)]
pub enum SignatureError {
    /// Request fields are missing or malformed.
    #[error("signature validation error: {0}")]
    Validation(#[from] SignatureValidationError),
    /// No signature exists for the identifier.
    #[error("signature not found: {0}")]
    NotFound(SignatureId),
    /// The signature was already invalidated.
    #[error("signature already invalidated: {0}")]
    AlreadyInvalidated(SignatureId),
    /// Payload could not be canonicalized.
    #[error("signature hash error: {0}")]
    Hash(#[from] HashError),
    /// Backing store rejected the operation.
    #[error("signature persistence error: {0}")]
    Persistence(#[from] StoreError),
}

// ============================================================================
// SECTION: Convenience Requests
// ============================================================================

/// Inputs for a training completion signature.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSignatureRequest {
    /// Enrollment being completed.
    pub enrollment_id: EnrollmentId,
    /// Signing user.
    pub user_id: UserId,
    /// Title of the completed course.
    pub course_title: String,
    /// Printed signer name.
    pub signer_name: String,
    /// Optional signer title.
    pub signer_title: Option<String>,
    /// Drawn signature as captured by the UI.
    pub signature_image: Value,
    /// Meaning statement replacing the generated template.
    pub custom_meaning: Option<String>,
}

/// Inputs for an acknowledgment signature.
#[derive(Debug, Clone, PartialEq)]
pub struct AcknowledgmentSignatureRequest {
    /// Enrollment the acknowledgment belongs to.
    pub enrollment_id: EnrollmentId,
    /// Signing user.
    pub user_id: UserId,
    /// Statement being acknowledged; used as the meaning.
    pub acknowledgment_text: String,
    /// Printed signer name.
    pub signer_name: String,
    /// Optional signer title.
    pub signer_title: Option<String>,
    /// Drawn signature as captured by the UI.
    pub signature_image: Value,
    /// Meaning statement replacing the acknowledgment text.
    pub custom_meaning: Option<String>,
}

/// Returns the standard attestation for completing `course_title`.
#[must_use]
pub fn completion_meaning(course_title: &str) -> String {
    format!(
        "I certify that I have completed the training course \"{course_title}\" and understand \
         its content. I acknowledge that this electronic signature is the legally binding \
         equivalent of my handwritten signature."
    )
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Orchestrates signature creation, verification, and invalidation.
pub struct SignatureService {
    /// Signature persistence.
    store: Arc<dyn SignatureStore>,
    /// Audit trail for captures and invalidations.
    audit: AuditLogger,
    /// Time source for capture and invalidation.
    clock: Arc<dyn Clock>,
    /// Best-effort device context for convenience creators.
    environment: Arc<dyn ClientEnvironment>,
    /// Request size limits.
    limits: SignatureLimits,
    /// Side channel for integrity failures.
    telemetry: Arc<dyn TelemetrySink>,
}

impl SignatureService {
    /// Creates a service with default limits.
    #[must_use]
    pub fn new(
        store: Arc<dyn SignatureStore>,
        audit: AuditLogger,
        clock: Arc<dyn Clock>,
        environment: Arc<dyn ClientEnvironment>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            store,
            audit,
            clock,
            environment,
            limits: SignatureLimits::default(),
            telemetry,
        }
    }

    /// Replaces the request size limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: SignatureLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Returns the active limits.
    #[must_use]
    pub const fn limits(&self) -> &SignatureLimits {
        &self.limits
    }

    // ------------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------------

    /// Validates, digests, and persists a new valid signature.
    ///
    /// The `signature_captured` audit entry is written best-effort and never
    /// fails the call.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Validation`] for malformed requests,
    /// [`SignatureError::Hash`] when the payload cannot be canonicalized, and
    /// [`SignatureError::Persistence`] when the insert fails.
    pub fn create(&self, request: SignatureRequest) -> Result<ElectronicSignature, SignatureError> {
        request.validate(&self.limits)?;
        let canonical = canonical_payload_bytes(&request.signature_data)?;
        if canonical.len() > self.limits.max_payload_bytes {
            return Err(SignatureValidationError::PayloadTooLarge {
                max: self.limits.max_payload_bytes,
                actual: canonical.len(),
            }
            .into());
        }
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &canonical);
        let record = NewSignatureRecord {
            enrollment_id: request.enrollment_id,
            user_id: request.user_id,
            signature_type: request.signature_type,
            signature_meaning: request.signature_meaning,
            signer_name: request.signer_name,
            signer_title: request.signer_title,
            signature_data: request.signature_data,
            signature_hash: digest.value,
            signed_at: self.clock.now(),
        };
        let signature = self.store.insert(record)?;
        self.audit.log_signature_captured(&signature, request.client);
        Ok(signature)
    }

    /// Creates a training completion signature with the standard attestation.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError`] as for [`Self::create`].
    pub fn create_completion_signature(
        &self,
        request: CompletionSignatureRequest,
    ) -> Result<ElectronicSignature, SignatureError> {
        let meaning =
            request.custom_meaning.unwrap_or_else(|| completion_meaning(&request.course_title));
        self.create(SignatureRequest {
            enrollment_id: request.enrollment_id,
            user_id: request.user_id,
            signature_type: SignatureType::TrainingCompletion,
            signer_name: request.signer_name,
            signer_title: request.signer_title,
            signature_data: self.assemble_payload(request.signature_image),
            signature_meaning: meaning,
            client: self.client_metadata(),
        })
    }

    /// Creates an acknowledgment signature whose meaning is the acknowledged text.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError`] as for [`Self::create`].
    pub fn create_acknowledgment_signature(
        &self,
        request: AcknowledgmentSignatureRequest,
    ) -> Result<ElectronicSignature, SignatureError> {
        let meaning = request.custom_meaning.unwrap_or(request.acknowledgment_text);
        self.create(SignatureRequest {
            enrollment_id: request.enrollment_id,
            user_id: request.user_id,
            signature_type: SignatureType::Acknowledgment,
            signer_name: request.signer_name,
            signer_title: request.signer_title,
            signature_data: self.assemble_payload(request.signature_image),
            signature_meaning: meaning,
            client: self.client_metadata(),
        })
    }

    // ------------------------------------------------------------------------
    // Verification
    // ------------------------------------------------------------------------

    /// Checks existence, validity, and payload integrity of a signature.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Persistence`] only when the store cannot be
    /// read. Every verification outcome, including tampering, is data.
    pub fn verify(&self, id: &SignatureId) -> Result<SignatureVerification, SignatureError> {
        let Some(signature) = self.store.get(id)? else {
            return Ok(verification(id, VerificationStatus::NotFound, Some(REASON_NOT_FOUND)));
        };
        if !signature.is_valid {
            let reason = signature.invalidation.as_ref().map(|inv| inv.reason.as_str());
            return Ok(verification(id, VerificationStatus::Invalidated, reason));
        }
        let intact = digest_payload(&signature.signature_data)
            .map(|digest| digest.matches_hex(&signature.signature_hash))
            .unwrap_or(false);
        if !intact {
            self.telemetry.record(&TelemetryEvent::new(
                EVENT_SIGNATURE_INTEGRITY_FAILED,
                self.clock.now(),
                COMPONENT,
                Some(id.to_string()),
                REASON_INTEGRITY_COMPROMISED,
            ));
            return Ok(verification(
                id,
                VerificationStatus::IntegrityCompromised,
                Some(REASON_INTEGRITY_COMPROMISED),
            ));
        }
        Ok(verification(id, VerificationStatus::Valid, None))
    }

    // ------------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------------

    /// Permanently invalidates a valid signature and returns the updated row.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Validation`] for blank inputs,
    /// [`SignatureError::NotFound`] for unknown ids,
    /// [`SignatureError::AlreadyInvalidated`] when the row is already invalid,
    /// and [`SignatureError::Persistence`] when the update fails.
    pub fn invalidate(
        &self,
        id: &SignatureId,
        invalidated_by: &UserId,
        reason: &str,
        client: Option<ClientMetadata>,
    ) -> Result<ElectronicSignature, SignatureError> {
        if invalidated_by.as_str().trim().is_empty() {
            return Err(SignatureValidationError::BlankInvalidatedBy.into());
        }
        if reason.trim().is_empty() {
            return Err(SignatureValidationError::BlankReason.into());
        }
        if reason.chars().count() > MAX_INVALIDATION_REASON_LENGTH {
            return Err(SignatureValidationError::ReasonTooLong {
                max: MAX_INVALIDATION_REASON_LENGTH,
            }
            .into());
        }
        let invalidation = SignatureInvalidation {
            invalidated_at: self.clock.now(),
            invalidated_by: invalidated_by.clone(),
            reason: reason.to_string(),
        };
        match self.store.invalidate(id, &invalidation)? {
            InvalidationOutcome::Applied(signature) => {
                self.audit.log_signature_invalidated(&signature, invalidated_by, reason, client);
                Ok(signature)
            }
            InvalidationOutcome::NotFound => Err(SignatureError::NotFound(id.clone())),
            InvalidationOutcome::AlreadyInvalid => {
                Err(SignatureError::AlreadyInvalidated(id.clone()))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Loads one signature by id regardless of validity.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Persistence`] when the read fails.
    pub fn get(&self, id: &SignatureId) -> Result<Option<ElectronicSignature>, SignatureError> {
        Ok(self.store.get(id)?)
    }

    /// Lists signatures for an enrollment, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Persistence`] when the read fails.
    pub fn get_by_enrollment(
        &self,
        enrollment_id: &EnrollmentId,
        filter: SignatureFilter,
    ) -> Result<Vec<ElectronicSignature>, SignatureError> {
        Ok(self.store.list_by_enrollment(enrollment_id, filter)?)
    }

    /// Lists signatures for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Persistence`] when the read fails.
    pub fn get_by_user(
        &self,
        user_id: &UserId,
        filter: SignatureFilter,
    ) -> Result<Vec<ElectronicSignature>, SignatureError> {
        Ok(self.store.list_by_user(user_id, filter)?)
    }

    /// Returns counts by validity and type across every row.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Persistence`] when the aggregate fails.
    pub fn get_statistics(&self) -> Result<SignatureStatistics, SignatureError> {
        Ok(self.store.statistics()?)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Builds the payload for a convenience creator.
    fn assemble_payload(&self, signature_image: Value) -> SignaturePayload {
        let mut payload = SignaturePayload::new();
        payload.insert(PAYLOAD_SIGNATURE_IMAGE, signature_image);
        payload.insert(PAYLOAD_SIGNED_AT, Value::from(self.clock.now().as_unix_millis()));
        let optional = [
            (PAYLOAD_USER_AGENT, self.environment.user_agent()),
            (PAYLOAD_DEVICE_FINGERPRINT, self.environment.device_fingerprint()),
            (PAYLOAD_IP_ADDRESS, self.environment.ip_address()),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                payload.insert(key, Value::String(value));
            }
        }
        payload
    }

    /// Returns audit client context from the environment, if any.
    fn client_metadata(&self) -> Option<ClientMetadata> {
        let metadata = ClientMetadata {
            ip_address: self.environment.ip_address(),
            user_agent: self.environment.user_agent(),
        };
        (metadata != ClientMetadata::default()).then_some(metadata)
    }
}

/// Builds a verification result.
fn verification(
    id: &SignatureId,
    status: VerificationStatus,
    reason: Option<&str>,
) -> SignatureVerification {
    SignatureVerification {
        signature_id: id.clone(),
        status,
        reason: reason.map(ToString::to_string),
    }
}
