// crates/granule-catalog-config/src/config.rs
// ============================================================================
// Module: Granule Catalog Configuration
// Description: Configuration loading and validation for the catalog worker.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: granule-catalog-core, granule-catalog-store-postgres, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is read from a TOML file with strict size and path limits,
//! then the database boundary is overridden from the deployment environment
//! (`DATABASE_HOST`, `DATABASE_PORT`, `DATABASE_NAME`, `APPLICATION_USER`,
//! `APPLICATION_PASSWORD`, `ADMIN_DATABASE`, `ADMIN_USER`, `ADMIN_PASSWORD`).
//! Environment lookups are injectable so callers and tests never mutate the
//! process environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use granule_catalog_core::BatchDriverConfig;
use granule_catalog_core::CatalogAuditSink;
use granule_catalog_core::FailurePolicy;
use granule_catalog_core::FileAuditSink;
use granule_catalog_core::NoopAuditSink;
use granule_catalog_core::StderrAuditSink;
use granule_catalog_core::runtime::DEFAULT_MAX_BATCH_RECORDS;
use granule_catalog_core::runtime::DEFAULT_MAX_BODY_BYTES;
use granule_catalog_store_postgres::PostgresCatalogConfig;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "granule-catalog.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "GRANULE_CATALOG_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for `ingest.max_body_bytes`.
pub(crate) const MAX_BODY_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Upper bound for `ingest.max_batch_records`.
pub(crate) const MAX_BATCH_RECORDS_LIMIT: usize = 100_000;

/// Database host override.
pub const DATABASE_HOST_ENV: &str = "DATABASE_HOST";
/// Database port override.
pub const DATABASE_PORT_ENV: &str = "DATABASE_PORT";
/// Catalog database name override.
pub const DATABASE_NAME_ENV: &str = "DATABASE_NAME";
/// Application login override.
pub const APPLICATION_USER_ENV: &str = "APPLICATION_USER";
/// Application password override.
pub const APPLICATION_PASSWORD_ENV: &str = "APPLICATION_PASSWORD";
/// Admin database override.
pub const ADMIN_DATABASE_ENV: &str = "ADMIN_DATABASE";
/// Admin login override.
pub const ADMIN_USER_ENV: &str = "ADMIN_USER";
/// Admin password override.
pub const ADMIN_PASSWORD_ENV: &str = "ADMIN_PASSWORD";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Granule catalog worker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GranuleCatalogConfig {
    /// Catalog database connection.
    #[serde(default)]
    pub database: PostgresCatalogConfig,
    /// Batch processing settings.
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Audit log settings.
    #[serde(default)]
    pub audit: AuditConfig,
    /// File the configuration was read from, if any (not serialized).
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl GranuleCatalogConfig {
    /// Loads configuration from disk using the default resolution rules and
    /// the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is missing, unreadable, or invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, process_env)
    }

    /// Loads configuration from disk with an injected environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is missing, unreadable, or invalid.
    pub fn load_with_env(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path, &lookup)?;
        let mut config = Self::read(&resolved)?;
        config.apply_env_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves configuration like [`Self::load`], falling back to defaults
    /// plus environment when no path is given and the default file is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an explicit file is missing or any layer
    /// is invalid.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve_with_env(path, process_env)
    }

    /// Resolves configuration with an injected environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an explicit file is missing or any layer
    /// is invalid.
    pub fn resolve_with_env(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let explicit = path.is_some() || lookup(CONFIG_ENV_VAR).is_some();
        let resolved = resolve_path(path, &lookup)?;
        let mut config = if explicit || resolved.exists() {
            Self::read(&resolved)?
        } else {
            Self::default()
        };
        config.apply_env_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration text without environment overrides or validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the TOML is malformed.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Overrides database settings from environment variables.
    ///
    /// Unset and empty variables leave the file value in place.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `DATABASE_PORT` is not a port.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let database = &mut self.database;
        if let Some(host) = value(DATABASE_HOST_ENV) {
            database.host = host;
        }
        if let Some(port) = value(DATABASE_PORT_ENV) {
            database.port = port.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{DATABASE_PORT_ENV} must be a port number"))
            })?;
        }
        if let Some(name) = value(DATABASE_NAME_ENV) {
            database.user_database = name;
        }
        if let Some(user) = value(APPLICATION_USER_ENV) {
            database.user_username = user;
        }
        if let Some(password) = value(APPLICATION_PASSWORD_ENV) {
            database.user_password = password;
        }
        if let Some(name) = value(ADMIN_DATABASE_ENV) {
            database.admin_database = name;
        }
        if let Some(user) = value(ADMIN_USER_ENV) {
            database.admin_username = user;
        }
        if let Some(password) = value(ADMIN_PASSWORD_ENV) {
            database.admin_password = password;
        }
        Ok(())
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate().map_err(|err| ConfigError::Invalid(format!("database: {err}")))?;
        self.ingest.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Reads and parses a config file with size and encoding limits.
    fn read(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config = Self::from_toml_str(content)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }
}

/// Batch processing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Behavior after a record fails.
    pub failure_policy: FailurePolicy,
    /// Maximum accepted record body size in bytes.
    pub max_body_bytes: usize,
    /// Maximum accepted records per batch.
    pub max_batch_records: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_batch_records: DEFAULT_MAX_BATCH_RECORDS,
        }
    }
}

impl IngestConfig {
    /// Returns the batch driver settings.
    #[must_use]
    pub const fn driver_config(&self) -> BatchDriverConfig {
        BatchDriverConfig {
            failure_policy: self.failure_policy,
            max_body_bytes: self.max_body_bytes,
            max_records: self.max_batch_records,
        }
    }

    /// Validates ingest limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "ingest.max_body_bytes must be between 1 and {MAX_BODY_BYTES_LIMIT}"
            )));
        }
        if self.max_batch_records == 0 || self.max_batch_records > MAX_BATCH_RECORDS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "ingest.max_batch_records must be between 1 and {MAX_BATCH_RECORDS_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// Audit log settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// Emit audit events.
    pub enabled: bool,
    /// JSON-lines file to append to; stderr when unset.
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl AuditConfig {
    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened.
    pub fn build_sink(&self) -> Result<Arc<dyn CatalogAuditSink>, ConfigError> {
        if !self.enabled {
            return Ok(Arc::new(NoopAuditSink));
        }
        match &self.path {
            Some(path) => {
                let sink = FileAuditSink::new(Path::new(path.trim()))
                    .map_err(|err| ConfigError::Io(format!("audit log {path}: {err}")))?;
                Ok(Arc::new(sink))
            }
            None => Ok(Arc::new(StderrAuditSink)),
        }
    }

    /// Validates the audit path.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
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

/// Reads a variable from the process environment.
fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Some(env_path) = lookup(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
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
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
