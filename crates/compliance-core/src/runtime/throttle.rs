// crates/compliance-core/src/runtime/throttle.rs
// ============================================================================
// Module: Attempt Throttle
// Description: Sliding-window abuse guard over an injectable throttle store.
// Purpose: Refuse repeated login, signup, and verification resend attempts.
// Dependencies: crate::core, crate::interfaces, crate::runtime::telemetry
// ============================================================================

//! ## Overview
//! One [`AttemptThrottle`] guards one action with one [`ThrottlePolicy`].
//! Every attempt is a single atomic [`ThrottleStore::update`], so concurrent
//! callers cannot both observe a count below the limit and both be admitted.
//! A block is reported as a [`ThrottleDecision`], never as an error.
//!
//! Each call first sweeps entries of this action that are stale, which keeps
//! the store bounded without a background task.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::ThrottleDecision;
use crate::core::ThrottleEntry;
use crate::core::ThrottleKey;
use crate::core::ThrottlePolicy;
use crate::core::ThrottleState;
use crate::core::Timestamp;
use crate::core::throttle::ACTION_LOGIN;
use crate::core::throttle::ACTION_RESEND_VERIFICATION;
use crate::core::throttle::ACTION_SIGNUP;
use crate::core::throttle::apply_attempt;
use crate::interfaces::Clock;
use crate::interfaces::StoreError;
use crate::interfaces::ThrottleStore;
use crate::runtime::telemetry::EVENT_THROTTLE_BLOCKED;
use crate::runtime::telemetry::EVENT_THROTTLE_STORE_FAILED;
use crate::runtime::telemetry::TelemetryEvent;
use crate::runtime::telemetry::TelemetrySink;

/// Telemetry component name.
const COMPONENT: &str = "attempt_throttle";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Attempt throttle errors. Being blocked is not an error.
#[derive(Debug, Error)]
pub enum ThrottleError {
    /// Throttle store failed.
    #[error("throttle store error: {0}")]
    Store(String),
}

impl From<StoreError> for ThrottleError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

// ============================================================================
// SECTION: Throttle
// ============================================================================

/// Attempt throttle for one guarded action.
#[derive(Clone)]
pub struct AttemptThrottle {
    /// Action label used as the key prefix.
    action: String,
    /// Attempt limits.
    policy: ThrottlePolicy,
    /// Shared entry storage.
    store: Arc<dyn ThrottleStore>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Side channel for block transitions and sweep failures.
    telemetry: Arc<dyn TelemetrySink>,
}

impl AttemptThrottle {
    /// Creates a throttle for `action` with `policy`.
    #[must_use]
    pub fn new(
        action: impl Into<String>,
        policy: ThrottlePolicy,
        store: Arc<dyn ThrottleStore>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            action: action.into(),
            policy,
            store,
            clock,
            telemetry,
        }
    }

    /// Returns the guarded action label.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> &ThrottlePolicy {
        &self.policy
    }

    /// Returns the store key for `identifier`.
    #[must_use]
    pub fn key(&self, identifier: &str) -> ThrottleKey {
        ThrottleKey::new(&self.action, identifier)
    }

    /// Returns true when `identifier` is currently refused.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::Store`] when the store cannot be read.
    pub fn is_blocked(&self, identifier: &str) -> Result<bool, ThrottleError> {
        let now = self.clock.now();
        self.sweep(now);
        let key = self.key(identifier);
        let Some(entry) = self.store.get(&key)? else {
            return Ok(false);
        };
        match entry.state(&self.policy, now) {
            ThrottleState::Blocked => Ok(true),
            ThrottleState::Counting => Ok(false),
            ThrottleState::Expired => {
                self.store.delete(&key)?;
                Ok(false)
            }
        }
    }

    /// Records one attempt and returns the resulting decision.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::Store`] when the update fails.
    pub fn record_attempt(&self, identifier: &str) -> Result<ThrottleDecision, ThrottleError> {
        let now = self.clock.now();
        self.sweep(now);
        let key = self.key(identifier);
        let policy = self.policy;
        let mut previous: Option<ThrottleEntry> = None;
        let stored = self.store.update(&key, &mut |current: Option<ThrottleEntry>| {
            previous = current;
            Some(apply_attempt(current, &policy, now))
        })?;
        let Some(entry) = stored else {
            return Err(ThrottleError::Store(format!("throttle entry for {key} was not stored")));
        };
        let was_blocked =
            previous.is_some_and(|prior| prior.state(&policy, now) == ThrottleState::Blocked);
        let decision = entry.decision(&policy, now);
        if decision.blocked && !was_blocked {
            self.telemetry.record(&TelemetryEvent::new(
                EVENT_THROTTLE_BLOCKED,
                now,
                COMPONENT,
                Some(key.to_string()),
                format!("blocked after {} attempts", entry.attempts),
            ));
        }
        Ok(decision)
    }

    /// Clears the entry for `identifier`, forgiving prior attempts.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::Store`] when the delete fails.
    pub fn reset(&self, identifier: &str) -> Result<(), ThrottleError> {
        self.sweep(self.clock.now());
        self.store.delete(&self.key(identifier))?;
        Ok(())
    }

    /// Returns milliseconds until the block on `identifier` ends, 0 if not blocked.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::Store`] when the store cannot be read.
    pub fn remaining_time_ms(&self, identifier: &str) -> Result<u64, ThrottleError> {
        let now = self.clock.now();
        self.sweep(now);
        let Some(entry) = self.store.get(&self.key(identifier))? else {
            return Ok(0);
        };
        if entry.state(&self.policy, now) != ThrottleState::Blocked {
            return Ok(0);
        }
        Ok(now.millis_until(entry.reset_time(&self.policy)))
    }

    /// Removes stale entries for this action and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::Store`] when the sweep fails.
    pub fn purge_expired(&self, now: Timestamp) -> Result<usize, ThrottleError> {
        let prefix = format!("{}:", self.action);
        let policy = self.policy;
        let removed = self.store.purge(&prefix, &|_key: &ThrottleKey, entry: &ThrottleEntry| {
            entry.is_expired(&policy, now)
        })?;
        Ok(removed)
    }

    /// Opportunistic sweep; failures go to telemetry only.
    fn sweep(&self, now: Timestamp) {
        if let Err(err) = self.purge_expired(now) {
            self.telemetry.record(&TelemetryEvent::new(
                EVENT_THROTTLE_STORE_FAILED,
                now,
                COMPONENT,
                Some(self.action.clone()),
                err.to_string(),
            ));
        }
    }
}

// ============================================================================
// SECTION: Auth Throttles
// ============================================================================

/// The three authentication throttles over one shared store and clock.
#[derive(Clone)]
pub struct AuthThrottles {
    /// Login attempts.
    pub login: AttemptThrottle,
    /// Signup attempts.
    pub signup: AttemptThrottle,
    /// Verification email resends.
    pub resend_verification: AttemptThrottle,
}

impl AuthThrottles {
    /// Creates the throttles with the default policies.
    #[must_use]
    pub fn new(
        store: Arc<dyn ThrottleStore>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self::with_policies(
            store,
            clock,
            telemetry,
            ThrottlePolicy::login(),
            ThrottlePolicy::signup(),
            ThrottlePolicy::resend_verification(),
        )
    }

    /// Creates the throttles with explicit policies.
    #[must_use]
    pub fn with_policies(
        store: Arc<dyn ThrottleStore>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn TelemetrySink>,
        login: ThrottlePolicy,
        signup: ThrottlePolicy,
        resend_verification: ThrottlePolicy,
    ) -> Self {
        let build = |action: &str, policy: ThrottlePolicy| {
            AttemptThrottle::new(
                action,
                policy,
                Arc::clone(&store),
                Arc::clone(&clock),
                Arc::clone(&telemetry),
            )
        };
        Self {
            login: build(ACTION_LOGIN, login),
            signup: build(ACTION_SIGNUP, signup),
            resend_verification: build(ACTION_RESEND_VERIFICATION, resend_verification),
        }
    }
}
