// crates/compliance-core/src/core/throttle.rs
// ============================================================================
// Module: Attempt Throttle Model
// Description: Policies, keys, entries, and the per-key window state machine.
// Purpose: Describe abuse throttling for login, signup, and verification resend.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Each `(action, identifier)` pair owns one [`ThrottleEntry`]. The entry
//! moves through Counting and Blocked and is discarded once Expired:
//!
//! - Counting: attempts below `max_attempts` inside a live window.
//! - Blocked: `blocked_until` is in the future, or attempts reached the limit
//!   inside a live window.
//! - Expired: the window elapsed and no block is in force. A block shorter
//!   than the window keeps refusing until the window closes.
//!
//! The transition functions here are pure; storage and time are supplied by
//! the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// One minute in milliseconds.
const MINUTE_MS: u64 = 60_000;

/// Action label for login attempts.
pub const ACTION_LOGIN: &str = "login";
/// Action label for signup attempts.
pub const ACTION_SIGNUP: &str = "signup";
/// Action label for verification email resends.
pub const ACTION_RESEND_VERIFICATION: &str = "resend_verification";

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Throttle parameters for one guarded action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottlePolicy {
    /// Attempts allowed inside one window before blocking.
    pub max_attempts: u32,
    /// Duration in which attempts accumulate.
    pub window_ms: u64,
    /// Duration an identifier stays blocked once the limit is hit.
    pub block_duration_ms: u64,
}

impl ThrottlePolicy {
    /// Creates a policy from explicit parameters.
    #[must_use]
    pub const fn new(max_attempts: u32, window_ms: u64, block_duration_ms: u64) -> Self {
        Self {
            max_attempts,
            window_ms,
            block_duration_ms,
        }
    }

    /// Login policy: 5 attempts per 15 minutes, 15 minute block.
    #[must_use]
    pub const fn login() -> Self {
        Self::new(5, 15 * MINUTE_MS, 15 * MINUTE_MS)
    }

    /// Signup policy: 3 attempts per 15 minutes, 30 minute block.
    #[must_use]
    pub const fn signup() -> Self {
        Self::new(3, 15 * MINUTE_MS, 30 * MINUTE_MS)
    }

    /// Resend-verification policy: 5 attempts per 5 minutes, 10 minute block.
    #[must_use]
    pub const fn resend_verification() -> Self {
        Self::new(5, 5 * MINUTE_MS, 10 * MINUTE_MS)
    }
}

// ============================================================================
// SECTION: Key
// ============================================================================

/// Store key for a guarded action and identifier, rendered `action:identifier`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThrottleKey(String);

impl ThrottleKey {
    /// Builds the key for `identifier` under `action`.
    #[must_use]
    pub fn new(action: &str, identifier: &str) -> Self {
        Self(format!("{action}:{identifier}"))
    }

    /// Wraps an already-rendered key (as read back from storage).
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the rendered key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThrottleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Entry State Machine
// ============================================================================

/// Lifecycle state of a throttle entry at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState {
    /// Attempts accumulating inside a live window.
    Counting,
    /// Further attempts are refused.
    Blocked,
    /// Entry is stale and must be treated as absent.
    Expired,
}

/// Per-key attempt counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleEntry {
    /// Attempts counted in the current window.
    pub attempts: u32,
    /// Time of the first attempt in the current window.
    pub window_start: Timestamp,
    /// End of the active block, when blocked.
    pub blocked_until: Option<Timestamp>,
}

impl ThrottleEntry {
    /// Returns the state of the entry at `now`.
    #[must_use]
    pub fn state(&self, policy: &ThrottlePolicy, now: Timestamp) -> ThrottleState {
        if self.blocked_until.is_some_and(|blocked_until| blocked_until > now) {
            return ThrottleState::Blocked;
        }
        if now.millis_since(self.window_start) >= policy.window_ms {
            return ThrottleState::Expired;
        }
        if self.attempts >= policy.max_attempts {
            ThrottleState::Blocked
        } else {
            ThrottleState::Counting
        }
    }

    /// Returns true when the entry is stale at `now`.
    #[must_use]
    pub fn is_expired(&self, policy: &ThrottlePolicy, now: Timestamp) -> bool {
        self.state(policy, now) == ThrottleState::Expired
    }

    /// Returns when the current window closes.
    #[must_use]
    pub fn window_end(&self, policy: &ThrottlePolicy) -> Timestamp {
        self.window_start.saturating_add_ms(policy.window_ms)
    }

    /// Returns when the entry stops blocking, if it blocks.
    ///
    /// A block ends at the later of `blocked_until` and the window end.
    #[must_use]
    pub fn reset_time(&self, policy: &ThrottlePolicy) -> Timestamp {
        let window_end = self.window_end(policy);
        self.blocked_until.map_or(window_end, |blocked_until| blocked_until.max(window_end))
    }

    /// Builds the caller-facing decision snapshot at `now`.
    #[must_use]
    pub fn decision(&self, policy: &ThrottlePolicy, now: Timestamp) -> ThrottleDecision {
        let blocked = self.state(policy, now) == ThrottleState::Blocked;
        ThrottleDecision {
            blocked,
            attempts_remaining: policy.max_attempts.saturating_sub(self.attempts),
            reset_time: self.reset_time(policy),
            blocked_until: blocked.then(|| self.reset_time(policy)),
        }
    }
}

/// Applies one attempt to the current entry and returns the successor.
///
/// Expired or missing entries restart the window at one attempt. Attempts
/// made while blocked are not counted and do not extend the block. Reaching
/// `max_attempts` starts a block of `block_duration_ms`.
#[must_use]
pub fn apply_attempt(
    current: Option<ThrottleEntry>,
    policy: &ThrottlePolicy,
    now: Timestamp,
) -> ThrottleEntry {
    let live = current.filter(|entry| !entry.is_expired(policy, now));
    let mut entry = match live {
        Some(entry) if entry.state(policy, now) == ThrottleState::Blocked => return entry,
        Some(mut entry) => {
            entry.attempts = entry.attempts.saturating_add(1);
            entry
        }
        None => ThrottleEntry {
            attempts: 1,
            window_start: now,
            blocked_until: None,
        },
    };
    if entry.attempts >= policy.max_attempts {
        entry.blocked_until = Some(now.saturating_add_ms(policy.block_duration_ms));
    }
    entry
}

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// Structured rate-limit decision; a block is data, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleDecision {
    /// Whether further attempts are refused.
    pub blocked: bool,
    /// Attempts left in the current window.
    pub attempts_remaining: u32,
    /// When the block ends, or when the window closes if not blocked.
    pub reset_time: Timestamp,
    /// End of the active block.
    pub blocked_until: Option<Timestamp>,
}
