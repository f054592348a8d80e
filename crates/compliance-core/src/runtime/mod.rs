// crates/compliance-core/src/runtime/mod.rs
// ============================================================================
// Module: Compliance Runtime
// Description: Signature service, audit logger, attempt throttle, and helpers.
// Purpose: Execute compliance operations against injected collaborators.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the compliance services on top of the store,
//! clock, and client environment interfaces. In-memory stores and clocks live
//! here so tests and single-process deployments share the same engine logic.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod clock;
pub mod signatures;
pub mod store;
pub mod telemetry;
pub mod throttle;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditError;
pub use audit::AuditLogger;
pub use audit::DataChange;
pub use clock::ManualClock;
pub use clock::NoClientEnvironment;
pub use clock::StaticClientEnvironment;
pub use clock::SystemClock;
pub use signatures::AcknowledgmentSignatureRequest;
pub use signatures::CompletionSignatureRequest;
pub use signatures::SignatureError;
pub use signatures::SignatureService;
pub use signatures::completion_meaning;
pub use store::InMemoryAuditLogStore;
pub use store::InMemorySignatureStore;
pub use store::InMemoryThrottleStore;
pub use telemetry::FileTelemetrySink;
pub use telemetry::NoopTelemetrySink;
pub use telemetry::StderrTelemetrySink;
pub use telemetry::TelemetryEvent;
pub use telemetry::TelemetrySink;
pub use throttle::AttemptThrottle;
pub use throttle::AuthThrottles;
pub use throttle::ThrottleError;
