// crates/compliance-core/src/runtime/telemetry.rs
// ============================================================================
// Module: Compliance Telemetry
// Description: Side-channel event sinks for best-effort failures and security signals.
// Purpose: Report infrastructure noise out of band instead of through return values.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Secondary failures (an audit write that could not be stored, a throttle
//! store that could not be swept) never change the outcome of the primary
//! operation. They are reported here as JSON-line events so deployments can
//! route them to their logging pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::core::Timestamp;

// ============================================================================
// SECTION: Event Labels
// ============================================================================

/// Best-effort audit notification could not be stored.
pub const EVENT_AUDIT_WRITE_FAILED: &str = "audit_write_failed";
/// A throttle key transitioned to blocked.
pub const EVENT_THROTTLE_BLOCKED: &str = "throttle_blocked";
/// The throttle store failed during a sweep.
pub const EVENT_THROTTLE_STORE_FAILED: &str = "throttle_store_failed";
/// Verification detected a payload digest mismatch.
pub const EVENT_SIGNATURE_INTEGRITY_FAILED: &str = "signature_integrity_failed";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Telemetry event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Emitting component.
    pub component: &'static str,
    /// Subject of the event (signature id, throttle key, audit action).
    pub subject: Option<String>,
    /// Detail message.
    pub message: String,
}

impl TelemetryEvent {
    /// Creates a telemetry event.
    #[must_use]
    pub fn new(
        event: &'static str,
        at: Timestamp,
        component: &'static str,
        subject: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event,
            timestamp_ms: at.as_unix_millis(),
            component,
            subject,
            message: message.into(),
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sink for telemetry events.
pub trait TelemetrySink: Send + Sync {
    /// Record a telemetry event.
    fn record(&self, event: &TelemetryEvent);
}

/// Telemetry sink that logs JSON lines to stderr.
pub struct StderrTelemetrySink;

impl TelemetrySink for StderrTelemetrySink {
    fn record(&self, event: &TelemetryEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Telemetry sink that appends JSON lines to a file.
pub struct FileTelemetrySink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileTelemetrySink {
    /// Opens the telemetry log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl TelemetrySink for FileTelemetrySink {
    fn record(&self, event: &TelemetryEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op telemetry sink.
pub struct NoopTelemetrySink;

impl TelemetrySink for NoopTelemetrySink {
    fn record(&self, _event: &TelemetryEvent) {}
}
