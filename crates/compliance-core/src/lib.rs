// crates/compliance-core/src/lib.rs
// ============================================================================
// Module: Compliance Core Library
// Description: Public API surface for the compliance integrity subsystem.
// Purpose: Expose core types, interfaces, and runtime services.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Compliance core records legally meaningful electronic signatures with a
//! tamper-evident payload digest, keeps a write-once audit trail of
//! compliance-relevant actions, and throttles repeated authentication
//! attempts. It is backend-agnostic and talks to storage, time, and the
//! signing client only through the traits in [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AuditLogStore;
pub use interfaces::ClientEnvironment;
pub use interfaces::Clock;
pub use interfaces::SignatureStore;
pub use interfaces::StoreError;
pub use interfaces::ThrottleStore;
pub use runtime::AcknowledgmentSignatureRequest;
pub use runtime::AttemptThrottle;
pub use runtime::AuditError;
pub use runtime::AuditLogger;
pub use runtime::AuthThrottles;
pub use runtime::CompletionSignatureRequest;
pub use runtime::DataChange;
pub use runtime::FileTelemetrySink;
pub use runtime::InMemoryAuditLogStore;
pub use runtime::InMemorySignatureStore;
pub use runtime::InMemoryThrottleStore;
pub use runtime::ManualClock;
pub use runtime::NoClientEnvironment;
pub use runtime::NoopTelemetrySink;
pub use runtime::SignatureError;
pub use runtime::SignatureService;
pub use runtime::StaticClientEnvironment;
pub use runtime::StderrTelemetrySink;
pub use runtime::SystemClock;
pub use runtime::TelemetryEvent;
pub use runtime::TelemetrySink;
pub use runtime::ThrottleError;
pub use runtime::completion_meaning;
