// crates/schema-gate-config/src/config.rs
// ============================================================================
// Module: Schema Gate Configuration
// Description: Configuration loading and validation for Schema Gate hosts.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: schema-gate-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional and falls back to the runtime defaults; values
//! that are present are range checked and unknown keys are rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use schema_gate_core::AuditSink;
use schema_gate_core::BreakerConfig;
use schema_gate_core::DEFAULT_HASH_ALGORITHM;
use schema_gate_core::ExecutorConfig;
use schema_gate_core::FileAuditSink;
use schema_gate_core::HashAlgorithm;
use schema_gate_core::NoopAuditSink;
use schema_gate_core::StderrAuditSink;
use schema_gate_core::runtime::breaker::DEFAULT_FAILURE_THRESHOLD;
use schema_gate_core::runtime::breaker::DEFAULT_RESET_TIMEOUT_MS;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "schema-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SCHEMA_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Smallest accepted breaker failure threshold.
pub(crate) const MIN_FAILURE_THRESHOLD: u32 = 1;
/// Largest accepted breaker failure threshold.
pub(crate) const MAX_FAILURE_THRESHOLD: u32 = 100;
/// Smallest accepted breaker cool-down in milliseconds.
pub(crate) const MIN_RESET_TIMEOUT_MS: u64 = 1;
/// Largest accepted breaker cool-down in milliseconds (one day).
pub(crate) const MAX_RESET_TIMEOUT_MS: u64 = 86_400_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Schema Gate host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaGateConfig {
    /// Migration executor settings.
    #[serde(default)]
    pub executor: ExecutorSettings,
    /// Integrity tree settings.
    #[serde(default)]
    pub integrity: IntegrityConfig,
    /// Audit output settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl SchemaGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// An explicit `path` wins, then [`CONFIG_ENV_VAR`], then
    /// `schema-gate.toml` in the working directory.
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
        Self::parse(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
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
        self.executor.validate()?;
        self.audit.validate()
    }

    /// Returns the breaker tuning.
    #[must_use]
    pub const fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.executor.failure_threshold,
            reset_timeout_ms: self.executor.reset_timeout_ms,
        }
    }

    /// Returns the executor configuration.
    #[must_use]
    pub const fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            breaker: self.breaker_config(),
            verify_integrity: self.executor.verify_integrity,
            hash_algorithm: self.integrity.hash_algorithm,
        }
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened.
    pub fn build_audit_sink(&self) -> Result<Arc<dyn AuditSink>, ConfigError> {
        self.audit.build_sink()
    }
}

/// Migration executor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorSettings {
    /// Consecutive failed runs that open the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Breaker cool-down after the last failure, in milliseconds.
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
    /// Record an integrity baseline after each successful run.
    #[serde(default = "default_verify_integrity")]
    pub verify_integrity: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
            verify_integrity: default_verify_integrity(),
        }
    }
}

impl ExecutorSettings {
    /// Validates breaker bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_FAILURE_THRESHOLD ..= MAX_FAILURE_THRESHOLD).contains(&self.failure_threshold) {
            return Err(ConfigError::Invalid(format!(
                "executor.failure_threshold must be between {MIN_FAILURE_THRESHOLD} and \
                 {MAX_FAILURE_THRESHOLD}"
            )));
        }
        if !(MIN_RESET_TIMEOUT_MS ..= MAX_RESET_TIMEOUT_MS).contains(&self.reset_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "executor.reset_timeout_ms must be between {MIN_RESET_TIMEOUT_MS} and \
                 {MAX_RESET_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Integrity tree settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntegrityConfig {
    /// Hash algorithm for leaves and nodes.
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: HashAlgorithm,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: default_hash_algorithm(),
        }
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
    /// Discard audit events.
    None,
}

/// Audit output settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink selection.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path, required for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates the sink and path combination.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, self.path.as_deref()) {
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (AuditSinkKind::Stderr | AuditSinkKind::None, Some(_)) => Err(ConfigError::Invalid(
                "audit.path is only valid for the file sink".to_string(),
            )),
            (AuditSinkKind::Stderr | AuditSinkKind::None, None) => Ok(()),
        }
    }

    /// Builds the sink described by this section.
    fn build_sink(&self) -> Result<Arc<dyn AuditSink>, ConfigError> {
        match (self.sink, self.path.as_deref()) {
            (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
            (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
            (AuditSinkKind::File, Some(path)) => {
                let sink = FileAuditSink::new(Path::new(path.trim()))
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
        }
    }
}

/// Default breaker failure threshold.
const fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

/// Default breaker cool-down.
const fn default_reset_timeout_ms() -> u64 {
    DEFAULT_RESET_TIMEOUT_MS
}

/// Integrity recording is on unless disabled.
const fn default_verify_integrity() -> bool {
    true
}

/// Default hash algorithm.
const fn default_hash_algorithm() -> HashAlgorithm {
    DEFAULT_HASH_ALGORITHM
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

/// Resolves the config path from the caller or environment defaults.
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

/// Validates a path-valued setting against length limits.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
