// crates/granule-catalog-cli/src/main.rs
// ============================================================================
// Module: Granule Catalog CLI Entry Point
// Description: Command dispatcher for catalog ingest, validation, and migration.
// Purpose: Run queue batches against the catalog from a shell or a scheduler.
// Dependencies: clap, granule-catalog-config, granule-catalog-core, serde_json
// ============================================================================

//! ## Overview
//! The `granule-catalog` binary feeds queue events into the batch driver,
//! validates record bodies offline, applies the catalog schema, and checks
//! configuration files. Event files are untrusted input: reads are size
//! limited and every record is schema validated before any write.

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

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use granule_catalog_config::GranuleCatalogConfig;
use granule_catalog_core::BatchDriver;
use granule_catalog_core::BatchDriverConfig;
use granule_catalog_core::BatchReport;
use granule_catalog_core::CatalogValidator;
use granule_catalog_core::FailurePolicy;
use granule_catalog_core::NoopAuditSink;
use granule_catalog_core::QueueEvent;
use granule_catalog_core::QueueRecord;
use granule_catalog_store_postgres::migrate;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of an event file read from disk.
const MAX_EVENT_BYTES: usize = 64 * 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "granule-catalog", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Write every record of a queue event to the catalog.
    Ingest(IngestCommand),
    /// Validate record bodies without touching the database.
    Validate(ValidateCommand),
    /// Create the catalog database and apply its schema.
    Migrate(MigrateCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `ingest`.
#[derive(Args, Debug)]
struct IngestCommand {
    /// Queue event JSON (`{"Records": [...]}`) or a single catalog message.
    #[arg(long, value_name = "PATH")]
    event: PathBuf,
    /// Optional config file path (defaults to `granule-catalog.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Overrides `ingest.failure_policy` from the config file.
    #[arg(long, value_enum, value_name = "POLICY")]
    failure_policy: Option<FailurePolicyArg>,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
struct ValidateCommand {
    /// Queue event JSON (`{"Records": [...]}`) or a single catalog message.
    #[arg(long, value_name = "PATH")]
    event: PathBuf,
}

/// Arguments for `migrate`.
#[derive(Args, Debug)]
struct MigrateCommand {
    /// Optional config file path (defaults to `granule-catalog.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a granule catalog configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to `granule-catalog.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Failure policy selectable on the command line.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum FailurePolicyArg {
    /// Stop at the first failing record.
    FailFast,
    /// Attempt every record and report failures individually.
    Continue,
}

impl From<FailurePolicyArg> for FailurePolicy {
    fn from(value: FailurePolicyArg) -> Self {
        match value {
            FailurePolicyArg::FailFast => Self::FailFast,
            FailurePolicyArg::Continue => Self::Continue,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest(command) => command_ingest(&command),
        Commands::Validate(command) => command_validate(&command),
        Commands::Migrate(command) => command_migrate(&command),
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(command) => command_config_validate(&command),
        },
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes the ingest command.
fn command_ingest(command: &IngestCommand) -> CliResult<ExitCode> {
    let mut config = GranuleCatalogConfig::resolve(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    if let Some(policy) = command.failure_policy {
        config.ingest.failure_policy = policy.into();
    }
    let records = read_event(&command.event)?;
    let audit = config.audit.build_sink().map_err(|err| CliError::new(err.to_string()))?;
    let driver = BatchDriver::new(compile_validator()?, audit, config.ingest.driver_config());
    let report = driver
        .run(&records, &config.database)
        .map_err(|err| CliError::new(format!("batch failed: {err}")))?;
    write_json_line(&render_report(&report))?;
    if report.is_complete() { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::FAILURE) }
}

/// Executes the offline validation command.
fn command_validate(command: &ValidateCommand) -> CliResult<ExitCode> {
    let records = read_event(&command.event)?;
    let audit = Arc::new(NoopAuditSink);
    let driver = BatchDriver::new(compile_validator()?, audit, BatchDriverConfig::default());
    let mut all_valid = true;
    for (index, record) in records.iter().enumerate() {
        let line = match driver.decode_record(record) {
            Ok(message) => json!({
                "index": index,
                "message_id": record.message_id,
                "valid": true,
                "collection_id": message.collection.collection_id,
                "cumulus_granule_id": message.granule.cumulus_granule_id,
                "file_count": message.granule.files.len(),
            }),
            Err(error) => {
                all_valid = false;
                json!({
                    "index": index,
                    "message_id": record.message_id,
                    "valid": false,
                    "kind": error.kind(),
                    "error": error.to_string(),
                })
            }
        };
        write_json_line(&line)?;
    }
    if all_valid { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::FAILURE) }
}

/// Executes the migrate command.
fn command_migrate(command: &MigrateCommand) -> CliResult<ExitCode> {
    let config = GranuleCatalogConfig::resolve(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let report = migrate(&config.database)
        .map_err(|err| CliError::new(format!("migration failed: {err}")))?;
    write_json_line(&report)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = GranuleCatalogConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Event Helpers
// ============================================================================

/// Compiles the catalog message schema.
fn compile_validator() -> CliResult<Arc<CatalogValidator>> {
    CatalogValidator::new()
        .map(Arc::new)
        .map_err(|err| CliError::new(format!("schema compilation failed: {err}")))
}

/// Reads an event file and splits it into queue records.
fn read_event(path: &Path) -> CliResult<Vec<QueueRecord>> {
    let bytes = read_bytes_with_limit(path, MAX_EVENT_BYTES).map_err(|err| match err {
        ReadLimitError::Io(error) => {
            CliError::new(format!("failed to read event {}: {error}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "event {} is {size} bytes (max {limit})",
            path.display()
        )),
    })?;
    parse_event(&bytes)
}

/// Parses event bytes as a queue event, or as one direct message body.
///
/// A JSON object with a `Records` key is a queue delivery; anything else is
/// handed to the driver verbatim so the schema reports what is wrong with it.
fn parse_event(bytes: &[u8]) -> CliResult<Vec<QueueRecord>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| CliError::new("event must be utf-8".to_string()))?;
    let value: Value = serde_json::from_str(text)
        .map_err(|err| CliError::new(format!("event is not valid JSON: {err}")))?;
    if value.get("Records").is_some() {
        let event: QueueEvent = serde_json::from_value(value)
            .map_err(|err| CliError::new(format!("invalid queue event: {err}")))?;
        return Ok(event.records);
    }
    Ok(vec![QueueRecord::from_body(text)])
}

/// Renders a batch report as JSON.
fn render_report(report: &BatchReport) -> Value {
    let failures: Vec<Value> = report
        .failures
        .iter()
        .map(|failure| {
            json!({
                "index": failure.index,
                "message_id": failure.message_id,
                "kind": failure.error.kind(),
                "error": failure.error.to_string(),
            })
        })
        .collect();
    json!({
        "records": report.records,
        "written": report.written,
        "failures": failures,
        "batch_item_failures": report.item_failures().batch_item_failures,
    })
}

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
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

/// Serializes a value as one JSON line on stdout.
fn write_json_line<T: Serialize>(value: &T) -> CliResult<()> {
    let line = serde_json::to_string(value)
        .map_err(|err| CliError::new(format!("failed to serialize output: {err}")))?;
    write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
