// crates/compliance-core/src/runtime/clock.rs
// ============================================================================
// Module: Clocks and Client Environments
// Description: Wall-clock and manual clocks plus fixed client environments.
// Purpose: Supply injectable time and device context to the services.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`SystemClock`] reads the wall clock. [`ManualClock`] is shared, thread
//! safe, and only moves when told to, which lets tests step through throttle
//! windows without sleeping.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use crate::core::Timestamp;
use crate::interfaces::ClientEnvironment;
use crate::interfaces::Clock;

// ============================================================================
// SECTION: Clocks
// ============================================================================

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Timestamp::from_unix_millis(i64::try_from(now.as_millis()).unwrap_or(i64::MAX))
    }
}

/// Manually advanced time source shared across clones.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    /// Current time in unix milliseconds.
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    /// Creates a clock starting at `start`.
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.as_unix_millis())),
        }
    }

    /// Moves the clock forward by `millis`.
    pub fn advance_ms(&self, millis: u64) {
        let delta = i64::try_from(millis).unwrap_or(i64::MAX);
        let _ = self.millis.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            Some(current.saturating_add(delta))
        });
    }

    /// Sets the clock to `at`.
    pub fn set(&self, at: Timestamp) {
        self.millis.store(at.as_unix_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(self.millis.load(Ordering::SeqCst))
    }
}

// ============================================================================
// SECTION: Client Environments
// ============================================================================

/// Client environment that supplies nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClientEnvironment;

impl ClientEnvironment for NoClientEnvironment {
    fn device_fingerprint(&self) -> Option<String> {
        None
    }

    fn ip_address(&self) -> Option<String> {
        None
    }

    fn user_agent(&self) -> Option<String> {
        None
    }
}

/// Client environment with fixed values captured by the UI layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticClientEnvironment {
    /// Device/browser fingerprint.
    pub device_fingerprint: Option<String>,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
}

impl ClientEnvironment for StaticClientEnvironment {
    fn device_fingerprint(&self) -> Option<String> {
        self.device_fingerprint.clone()
    }

    fn ip_address(&self) -> Option<String> {
        self.ip_address.clone()
    }

    fn user_agent(&self) -> Option<String> {
        self.user_agent.clone()
    }
}
