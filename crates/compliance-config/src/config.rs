// crates/compliance-config/src/config.rs
// ============================================================================
// Module: Compliance Configuration
// Description: Configuration loading and validation for the compliance subsystem.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: compliance-core, compliance-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is a valid configuration.
//! Missing or invalid values fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use compliance_core::AuditLogStore;
use compliance_core::AuthThrottles;
use compliance_core::Clock;
use compliance_core::DEFAULT_MAX_MEANING_LENGTH;
use compliance_core::DEFAULT_MAX_PAYLOAD_BYTES;
use compliance_core::FileTelemetrySink;
use compliance_core::InMemoryAuditLogStore;
use compliance_core::InMemorySignatureStore;
use compliance_core::InMemoryThrottleStore;
use compliance_core::NoopTelemetrySink;
use compliance_core::SignatureLimits;
use compliance_core::SignatureStore;
use compliance_core::StderrTelemetrySink;
use compliance_core::TelemetrySink;
use compliance_core::ThrottlePolicy;
use compliance_core::ThrottleStore;
use compliance_store_sqlite::SqliteComplianceStore;
use compliance_store_sqlite::SqliteStoreConfig;
use compliance_store_sqlite::SqliteStoreError;
use compliance_store_sqlite::SqliteStoreMode;
use compliance_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "compliance.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "COMPLIANCE_CONFIG";
/// Maximum size of a config file in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound on `max_attempts` for any throttle.
pub(crate) const MAX_THROTTLE_ATTEMPTS: u32 = 1_000;
/// Shortest allowed throttle window or block (1 second).
pub(crate) const MIN_THROTTLE_DURATION_MS: u64 = 1_000;
/// Longest allowed throttle window or block (7 days).
pub(crate) const MAX_THROTTLE_DURATION_MS: u64 = 7 * 24 * 60 * 60 * 1_000;
/// Default `SQLite` busy timeout.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Upper bound on the `SQLite` busy timeout.
pub(crate) const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Smallest allowed signature payload limit.
pub(crate) const MIN_PAYLOAD_BYTES: usize = 1024;
/// Largest allowed signature payload limit.
pub(crate) const MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;
/// Largest allowed meaning length limit.
pub(crate) const MAX_MEANING_LENGTH: usize = 65_536;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Compliance subsystem configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComplianceConfig {
    /// Attempt throttle policies.
    #[serde(default)]
    pub throttle: ThrottleConfig,
    /// Persistence backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Side-channel event sink.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Signature capture limits.
    #[serde(default)]
    pub signatures: SignatureConfig,
}

impl ComplianceConfig {
    /// Loads configuration using the default resolution rules.
    ///
    /// The path is `path` if given, else `COMPLIANCE_CONFIG`, else
    /// `compliance.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.throttle.validate()?;
        self.store.validate()?;
        self.telemetry.validate()?;
        self.signatures.validate()?;
        Ok(())
    }

    /// Builds the three authentication throttles from the configured policies.
    #[must_use]
    pub fn auth_throttles(
        &self,
        store: Arc<dyn ThrottleStore>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> AuthThrottles {
        AuthThrottles::with_policies(
            store,
            clock,
            telemetry,
            self.throttle.login.policy(),
            self.throttle.signup.policy(),
            self.throttle.resend_verification.policy(),
        )
    }
}

// ============================================================================
// SECTION: Throttle Config
// ============================================================================

/// Per-action throttle policies.
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    /// Login attempts.
    #[serde(default = "ThrottlePolicyConfig::login")]
    pub login: ThrottlePolicyConfig,
    /// Signup attempts.
    #[serde(default = "ThrottlePolicyConfig::signup")]
    pub signup: ThrottlePolicyConfig,
    /// Verification email resends.
    #[serde(default = "ThrottlePolicyConfig::resend_verification")]
    pub resend_verification: ThrottlePolicyConfig,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            login: ThrottlePolicyConfig::login(),
            signup: ThrottlePolicyConfig::signup(),
            resend_verification: ThrottlePolicyConfig::resend_verification(),
        }
    }
}

impl ThrottleConfig {
    /// Validates every policy.
    fn validate(&self) -> Result<(), ConfigError> {
        self.login.validate("throttle.login")?;
        self.signup.validate("throttle.signup")?;
        self.resend_verification.validate("throttle.resend_verification")?;
        Ok(())
    }
}

/// One throttle policy as written in TOML.
///
/// A section that is present must set all three fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ThrottlePolicyConfig {
    /// Attempts allowed in one window.
    pub max_attempts: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Block length in milliseconds.
    pub block_duration_ms: u64,
}

impl ThrottlePolicyConfig {
    /// Login preset.
    fn login() -> Self {
        ThrottlePolicy::login().into()
    }

    /// Signup preset.
    fn signup() -> Self {
        ThrottlePolicy::signup().into()
    }

    /// Resend-verification preset.
    fn resend_verification() -> Self {
        ThrottlePolicy::resend_verification().into()
    }

    /// Returns the runtime policy.
    #[must_use]
    pub const fn policy(&self) -> ThrottlePolicy {
        ThrottlePolicy::new(self.max_attempts, self.window_ms, self.block_duration_ms)
    }

    /// Validates limits for the section named `field`.
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.max_attempts == 0 || self.max_attempts > MAX_THROTTLE_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "{field}.max_attempts must be between 1 and {MAX_THROTTLE_ATTEMPTS}"
            )));
        }
        validate_duration(&format!("{field}.window_ms"), self.window_ms)?;
        validate_duration(&format!("{field}.block_duration_ms"), self.block_duration_ms)?;
        Ok(())
    }
}

impl From<ThrottlePolicy> for ThrottlePolicyConfig {
    fn from(policy: ThrottlePolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            window_ms: policy.window_ms,
            block_duration_ms: policy.block_duration_ms,
        }
    }
}

// ============================================================================
// SECTION: Store Config
// ============================================================================

/// Persistence backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory store must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_path_string("store.path", &path.to_string_lossy())?;
                if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
                    return Err(ConfigError::Invalid(format!(
                        "store.busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Returns the `SQLite` settings, or `None` for the memory backend.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }
}

/// Store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the in-memory stores.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Store handles opened from a [`StoreConfig`].
#[derive(Clone)]
pub struct ComplianceStores {
    /// Signature records.
    pub signatures: Arc<dyn SignatureStore>,
    /// Audit log.
    pub audit: Arc<dyn AuditLogStore>,
    /// Throttle entries.
    pub throttle: Arc<dyn ThrottleStore>,
}

impl ComplianceStores {
    /// Opens the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the `SQLite` database cannot be opened.
    pub fn open(config: &StoreConfig) -> Result<Self, SqliteStoreError> {
        let Some(sqlite) = config.sqlite_config() else {
            return Ok(Self {
                signatures: Arc::new(InMemorySignatureStore::new()),
                audit: Arc::new(InMemoryAuditLogStore::new()),
                throttle: Arc::new(InMemoryThrottleStore::new()),
            });
        };
        let store = SqliteComplianceStore::new(&sqlite)?;
        Ok(Self {
            signatures: Arc::new(store.clone()),
            audit: Arc::new(store.clone()),
            throttle: Arc::new(store),
        })
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Telemetry Config
// ============================================================================

/// Telemetry sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: TelemetrySinkType,
    /// Output path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl TelemetryConfig {
    /// Validates telemetry configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (TelemetrySinkType::File, None) => {
                Err(ConfigError::Invalid("telemetry.sink=file requires path".to_string()))
            }
            (TelemetrySinkType::File, Some(path)) => {
                validate_path_string("telemetry.path", &path.to_string_lossy())
            }
            (_, Some(_)) => Err(ConfigError::Invalid(
                "telemetry.path is only valid with sink=file".to_string(),
            )),
            (_, None) => Ok(()),
        }
    }

    /// Builds the configured sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file sink cannot be opened.
    pub fn build_sink(&self) -> Result<Arc<dyn TelemetrySink>, ConfigError> {
        match (self.sink, &self.path) {
            (TelemetrySinkType::Stderr, _) => Ok(Arc::new(StderrTelemetrySink)),
            (TelemetrySinkType::None, _) => Ok(Arc::new(NoopTelemetrySink)),
            (TelemetrySinkType::File, Some(path)) => {
                let sink =
                    FileTelemetrySink::new(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
            (TelemetrySinkType::File, None) => {
                Err(ConfigError::Invalid("telemetry.sink=file requires path".to_string()))
            }
        }
    }
}

/// Telemetry sink kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TelemetrySinkType {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard events.
    None,
}

// ============================================================================
// SECTION: Signature Config
// ============================================================================

/// Signature capture limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SignatureConfig {
    /// Maximum canonical payload size in bytes.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    /// Maximum meaning statement length in characters.
    #[serde(default = "default_max_meaning_length")]
    pub max_meaning_length: usize,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            max_meaning_length: default_max_meaning_length(),
        }
    }
}

impl SignatureConfig {
    /// Validates signature limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_PAYLOAD_BYTES..=MAX_PAYLOAD_BYTES).contains(&self.max_payload_bytes) {
            return Err(ConfigError::Invalid(format!(
                "signatures.max_payload_bytes must be between {MIN_PAYLOAD_BYTES} and \
                 {MAX_PAYLOAD_BYTES}"
            )));
        }
        if self.max_meaning_length == 0 || self.max_meaning_length > MAX_MEANING_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "signatures.max_meaning_length must be between 1 and {MAX_MEANING_LENGTH}"
            )));
        }
        Ok(())
    }

    /// Returns the runtime limits.
    #[must_use]
    pub const fn limits(&self) -> SignatureLimits {
        SignatureLimits {
            max_meaning_length: self.max_meaning_length,
            max_payload_bytes: self.max_payload_bytes,
        }
    }
}

/// Default payload limit.
const fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}

/// Default meaning length limit.
const fn default_max_meaning_length() -> usize {
    DEFAULT_MAX_MEANING_LENGTH
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a throttle duration.
fn validate_duration(field: &str, value: u64) -> Result<(), ConfigError> {
    if (MIN_THROTTLE_DURATION_MS..=MAX_THROTTLE_DURATION_MS).contains(&value) {
        return Ok(());
    }
    Err(ConfigError::Invalid(format!(
        "{field} must be between {MIN_THROTTLE_DURATION_MS} and {MAX_THROTTLE_DURATION_MS}"
    )))
}
