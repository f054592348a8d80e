// crates/compliance-core/src/core/time.rs
// ============================================================================
// Module: Compliance Time Model
// Description: Canonical timestamp representation for signatures, audit, and throttling.
// Purpose: Keep every recorded time an explicit, injectable value.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! All compliance records carry unix epoch milliseconds. Services never read
//! the wall clock directly; they ask an injected [`crate::Clock`] so tests can
//! simulate elapsed time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Unix epoch milliseconds.
///
/// # Invariants
/// - Values are supplied by a clock or by stored records; no validation is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(value: i64) -> Self {
        Self(value)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns this timestamp shifted forward by `millis`, saturating at the max.
    #[must_use]
    pub fn saturating_add_ms(self, millis: u64) -> Self {
        let delta = i64::try_from(millis).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(delta))
    }

    /// Returns the milliseconds from `self` until `later`, or zero if `later` is not after `self`.
    #[must_use]
    pub const fn millis_until(self, later: Self) -> u64 {
        if later.0 <= self.0 { 0 } else { later.0.abs_diff(self.0) }
    }

    /// Returns the milliseconds elapsed since `earlier`, or zero if `earlier` is in the future.
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> u64 {
        earlier.millis_until(self)
    }
}
