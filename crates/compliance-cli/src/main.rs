// crates/compliance-cli/src/main.rs
// ============================================================================
// Module: Compliance CLI Entry Point
// Description: Command dispatcher for signature, audit, and config administration.
// Purpose: Give administrators offline access to the compliance records.
// Dependencies: clap, compliance-config, compliance-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The `compliance` binary verifies and invalidates electronic signatures,
//! reports signature statistics, queries the audit trail, hashes payload
//! files, and validates configuration. Every command prints one JSON
//! document on stdout. Store commands require `store.type = "sqlite"`.
//!
//! Security posture: inputs are untrusted; file reads are size-limited.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgGroup;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use compliance_config::ComplianceConfig;
use compliance_config::ComplianceStores;
use compliance_config::StoreType;
use compliance_core::AuditLogger;
use compliance_core::AuditQuery;
use compliance_core::Clock;
use compliance_core::EnrollmentId;
use compliance_core::NoClientEnvironment;
use compliance_core::SignatureFilter;
use compliance_core::SignatureId;
use compliance_core::SignaturePayload;
use compliance_core::SignatureService;
use compliance_core::SystemClock;
use compliance_core::Timestamp;
use compliance_core::UserId;
use compliance_core::digest_payload;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a payload file accepted by `hash`.
const MAX_HASH_INPUT_BYTES: usize = 16 * 1024 * 1024;
/// Default audit page size.
const DEFAULT_PAGE_LIMIT: u32 = 50;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "compliance", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (defaults to `COMPLIANCE_CONFIG` or compliance.toml).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Print the digest of a signature payload file.
    Hash(HashCommand),
    /// Electronic signature administration.
    Signature {
        /// Selected signature subcommand.
        #[command(subcommand)]
        command: SignatureCommand,
    },
    /// Audit trail queries.
    Audit {
        /// Selected audit subcommand.
        #[command(subcommand)]
        command: AuditCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the configuration file.
    Validate,
}

/// Arguments for `hash`.
#[derive(Args, Debug)]
struct HashCommand {
    /// JSON file holding the signature payload object.
    #[arg(long, value_name = "FILE")]
    input: PathBuf,
}

/// Signature subcommands.
#[derive(Subcommand, Debug)]
enum SignatureCommand {
    /// Recompute and compare a signature hash.
    Verify(SignatureIdArgs),
    /// Permanently invalidate a signature.
    Invalidate(InvalidateCommand),
    /// List signatures for a user or an enrollment.
    List(ListCommand),
    /// Report signature counts.
    Stats,
}

/// Arguments naming one signature.
#[derive(Args, Debug)]
struct SignatureIdArgs {
    /// Signature identifier.
    #[arg(long)]
    id: String,
}

/// Arguments for `signature invalidate`.
#[derive(Args, Debug)]
struct InvalidateCommand {
    /// Signature identifier.
    #[arg(long)]
    id: String,
    /// Administrator performing the invalidation.
    #[arg(long = "by", value_name = "USER")]
    invalidated_by: String,
    /// Reason recorded with the invalidation.
    #[arg(long)]
    reason: String,
}

/// Arguments for `signature list`.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("owner").required(true).args(["user", "enrollment"])))]
struct ListCommand {
    /// List signatures by signing user.
    #[arg(long)]
    user: Option<String>,
    /// List signatures by enrollment.
    #[arg(long)]
    enrollment: Option<String>,
    /// Include invalidated signatures.
    #[arg(long)]
    include_invalid: bool,
}

/// Audit subcommands.
#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Query the audit trail with filters.
    List(AuditListCommand),
    /// List security events.
    Security(AuditViewCommand),
    /// List training events.
    Training(AuditViewCommand),
}

/// Arguments for `audit list`.
#[derive(Args, Debug)]
struct AuditListCommand {
    /// Acting user.
    #[arg(long)]
    actor: Option<String>,
    /// Action label; repeat to match any of several.
    #[arg(long = "action")]
    actions: Vec<String>,
    /// Resource type.
    #[arg(long)]
    resource_type: Option<String>,
    /// Resource identifier.
    #[arg(long)]
    resource_id: Option<String>,
    /// Earliest creation time, unix milliseconds.
    #[arg(long, value_name = "MS")]
    since: Option<i64>,
    /// Latest creation time, unix milliseconds.
    #[arg(long, value_name = "MS")]
    until: Option<i64>,
    /// Page size.
    #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
    limit: u32,
    /// Entries to skip.
    #[arg(long, default_value_t = 0)]
    offset: u64,
}

/// Arguments for the predefined audit views.
#[derive(Args, Debug)]
struct AuditViewCommand {
    /// Page size.
    #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
    limit: u32,
    /// Entries to skip.
    #[arg(long, default_value_t = 0)]
    offset: u64,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying a one-line message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Result of a command: the JSON document to print and whether it succeeded.
#[derive(Debug)]
struct Outcome {
    /// Document written to stdout.
    output: Value,
    /// False when the command ran but reported a negative result.
    success: bool,
}

impl Outcome {
    /// Wraps a serializable success value.
    fn ok<T: Serialize>(value: &T) -> CliResult<Self> {
        Ok(Self {
            output: to_json(value)?,
            success: true,
        })
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(outcome) => {
            if let Err(err) = write_json(&outcome.output) {
                return emit_error(&err.to_string());
            }
            if outcome.success { ExitCode::SUCCESS } else { ExitCode::FAILURE }
        }
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the parsed command.
fn execute(cli: Cli) -> CliResult<Outcome> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Config {
            command: ConfigCommand::Validate,
        } => {
            load_config(config_path)?;
            Outcome::ok(&json!({"status": "valid"}))
        }
        Commands::Hash(command) => command_hash(&command),
        Commands::Signature {
            command,
        } => command_signature(&Services::open(&load_config(config_path)?)?, command),
        Commands::Audit {
            command,
        } => command_audit(&Services::open(&load_config(config_path)?)?.audit, command),
    }
}

/// Loads and validates the configuration.
fn load_config(path: Option<&Path>) -> CliResult<ComplianceConfig> {
    ComplianceConfig::load(path)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

// ============================================================================
// SECTION: Services
// ============================================================================

/// Runtime services backed by the configured `SQLite` store.
struct Services {
    /// Signature service.
    signatures: SignatureService,
    /// Audit logger.
    audit: AuditLogger,
}

impl Services {
    /// Opens the store and wires the services.
    fn open(config: &ComplianceConfig) -> CliResult<Self> {
        if config.store.store_type != StoreType::Sqlite {
            return Err(CliError::new(
                "store commands require store.type = \"sqlite\" in the config",
            ));
        }
        let stores = ComplianceStores::open(&config.store)
            .map_err(|err| CliError::new(format!("failed to open store: {err}")))?;
        let telemetry = config
            .telemetry
            .build_sink()
            .map_err(|err| CliError::new(format!("failed to open telemetry sink: {err}")))?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let audit = AuditLogger::new(stores.audit, Arc::clone(&clock), Arc::clone(&telemetry));
        let signatures = SignatureService::new(
            stores.signatures,
            audit.clone(),
            clock,
            Arc::new(NoClientEnvironment),
            telemetry,
        )
        .with_limits(config.signatures.limits());
        Ok(Self {
            signatures,
            audit,
        })
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes `hash`.
fn command_hash(command: &HashCommand) -> CliResult<Outcome> {
    let bytes = read_bytes_with_limit(&command.input, MAX_HASH_INPUT_BYTES).map_err(|err| {
        CliError::new(format!("failed to read {}: {err}", command.input.display()))
    })?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("payload is not valid json: {err}")))?;
    let payload = SignaturePayload::from_value(value)
        .ok_or_else(|| CliError::new("payload must be a json object"))?;
    let digest =
        digest_payload(&payload).map_err(|err| CliError::new(format!("hash failed: {err}")))?;
    Outcome::ok(&digest)
}

/// Executes a `signature` subcommand.
fn command_signature(services: &Services, command: SignatureCommand) -> CliResult<Outcome> {
    let service = &services.signatures;
    match command {
        SignatureCommand::Verify(args) => {
            let verification = service
                .verify(&SignatureId::new(args.id))
                .map_err(|err| CliError::new(err.to_string()))?;
            Ok(Outcome {
                output: to_json(&verification)?,
                success: verification.is_valid(),
            })
        }
        SignatureCommand::Invalidate(args) => {
            let signature = service
                .invalidate(
                    &SignatureId::new(args.id),
                    &UserId::new(args.invalidated_by),
                    &args.reason,
                    None,
                )
                .map_err(|err| CliError::new(err.to_string()))?;
            Outcome::ok(&signature)
        }
        SignatureCommand::List(args) => {
            let filter = if args.include_invalid {
                SignatureFilter::IncludeInvalid
            } else {
                SignatureFilter::ValidOnly
            };
            let listed = match (args.user, args.enrollment) {
                (Some(user), _) => service.get_by_user(&UserId::new(user), filter),
                (None, Some(enrollment)) => {
                    service.get_by_enrollment(&EnrollmentId::new(enrollment), filter)
                }
                (None, None) => return Err(CliError::new("--user or --enrollment is required")),
            };
            let signatures = listed.map_err(|err| CliError::new(err.to_string()))?;
            Outcome::ok(&signatures)
        }
        SignatureCommand::Stats => {
            let stats = service.get_statistics().map_err(|err| CliError::new(err.to_string()))?;
            Outcome::ok(&stats)
        }
    }
}

/// Executes an `audit` subcommand.
fn command_audit(audit: &AuditLogger, command: AuditCommand) -> CliResult<Outcome> {
    let page = match command {
        AuditCommand::List(args) => audit.list(&AuditQuery {
            actor_id: args.actor.map(UserId::new),
            actions: args.actions,
            resource_type: args.resource_type,
            resource_id: args.resource_id,
            success: None,
            since: args.since.map(Timestamp::from_unix_millis),
            until: args.until.map(Timestamp::from_unix_millis),
            limit: args.limit,
            offset: args.offset,
        }),
        AuditCommand::Security(args) => audit.security_events(None, None, args.limit, args.offset),
        AuditCommand::Training(args) => audit.training_events(None, args.limit, args.offset),
    };
    let page = page.map_err(|err| CliError::new(err.to_string()))?;
    Outcome::ok(&page)
}

// ============================================================================
// SECTION: File Helpers
// ============================================================================

/// Errors returned by bounded file reads.
#[derive(Debug, Error)]
enum ReadLimitError {
    /// File I/O failure.
    #[error("{0}")]
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    #[error("file size {size} exceeds limit {limit}")]
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Converts a serializable value to JSON.
fn to_json<T: Serialize>(value: &T) -> CliResult<Value> {
    serde_json::to_value(value)
        .map_err(|err| CliError::new(format!("failed to serialize output: {err}")))
}

/// Writes one JSON document to stdout.
fn write_json(value: &Value) -> CliResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|err| CliError::new(format!("failed to serialize output: {err}")))?;
    bytes.push(b'\n');
    std::io::stdout()
        .write_all(&bytes)
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
