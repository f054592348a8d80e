// crates/compliance-config/src/lib.rs
// ============================================================================
// Module: Compliance Config Library
// Description: Canonical config model and fail-closed validation.
// Purpose: Single source of truth for compliance.toml semantics.
// Dependencies: compliance-core, compliance-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `compliance-config` loads `compliance.toml`, validates every value against
//! hard limits, and builds the runtime collaborators the settings describe:
//! throttle policies, signature limits, telemetry sinks, and stores.
//!
//! Security posture: config inputs are untrusted and invalid values fail
//! closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
