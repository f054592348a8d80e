// crates/compliance-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Compliance Store
// Description: Durable compliance persistence backend using SQLite WAL.
// Purpose: Provide production persistence for signatures, audit logs, and throttles.
// Dependencies: compliance-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides one SQLite-backed store that implements the signature,
//! audit log, and throttle store interfaces from `compliance-core`. Schema
//! triggers enforce the write-once rules in storage as well as in code, so a
//! direct SQL client cannot delete signatures or rewrite audit history
//! without first dropping them.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteComplianceStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
