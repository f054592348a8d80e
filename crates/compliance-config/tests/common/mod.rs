// crates/compliance-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for compliance-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use compliance_config::ComplianceConfig;
use compliance_config::ConfigError;

/// Result type for tests that report failures as strings.
pub type TestResult = Result<(), String>;

/// Parses a TOML string into a `ComplianceConfig` without validating it.
pub fn config_from_toml(toml_str: &str) -> Result<ComplianceConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<ComplianceConfig, toml::de::Error> {
    config_from_toml("")
}

/// Asserts that `result` failed with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
