// crates/compliance-core/src/core/hashing.rs
// ============================================================================
// Module: Signature Payload Hashing
// Description: Canonicalization and SHA-256 digesting of signature payloads.
// Purpose: Provide the deterministic fingerprint stored with every signature.
// Dependencies: serde, serde_json, sha2
// ============================================================================

//! ## Overview
//! Signature payloads are canonicalized by sorting their **top-level** keys and
//! encoding the result as compact JSON. The canonical bytes are hashed with
//! SHA-256 and rendered as lowercase hex.
//!
//! Nested objects keep their original key order. Stored signature hashes
//! depend on this shallow form, so it must not be replaced with a deep sort
//! without a migration of every stored digest.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::core::signature::SignaturePayload;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Supported hash algorithms for signature payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256 hashing.
    Sha256,
}

impl HashAlgorithm {
    /// Returns the canonical storage label for the algorithm.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    /// Parses a storage label into an algorithm.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }
}

/// Default hash algorithm for signature payloads.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

// ============================================================================
// SECTION: Hash Digest
// ============================================================================

/// Deterministic content hash representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigest {
    /// Hash algorithm identifier.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub value: String,
}

impl HashDigest {
    /// Creates a new digest from raw bytes.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            value: hex_encode(bytes),
        }
    }

    /// Returns true when the hex value matches `other` byte-for-byte.
    #[must_use]
    pub fn matches_hex(&self, other: &str) -> bool {
        self.value.as_bytes() == other.as_bytes()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing payload hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// Payload canonicalization failed.
    #[error("failed to canonicalize payload: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns the canonical bytes for a signature payload.
///
/// Top-level keys are emitted in lexicographic order; nested values are
/// emitted exactly as stored.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_payload_bytes(payload: &SignaturePayload) -> Result<Vec<u8>, HashError> {
    let mut keys: Vec<&String> = payload.as_map().keys().collect();
    keys.sort();
    let mut sorted = Map::with_capacity(keys.len());
    for key in keys {
        if let Some(value) = payload.as_map().get(key) {
            sorted.insert(key.clone(), value.clone());
        }
    }
    serde_json::to_vec(&Value::Object(sorted))
        .map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Digests a signature payload with the default algorithm.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn digest_payload(payload: &SignaturePayload) -> Result<HashDigest, HashError> {
    digest_payload_with(DEFAULT_HASH_ALGORITHM, payload)
}

/// Digests a signature payload with the provided algorithm.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn digest_payload_with(
    algorithm: HashAlgorithm,
    payload: &SignaturePayload,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_payload_bytes(payload)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Hashes raw bytes using the provided algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            let digest = hasher.finalize();
            HashDigest::new(HashAlgorithm::Sha256, &digest)
        }
    }
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
