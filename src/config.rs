//! Orchestrator configuration.
//!
//! Values come from defaults, an optional JSON file and `GROPIUS_*`
//! environment variables, in that order of precedence (later wins).

use crate::execution::ToolCommand;
use crate::logs::DEFAULT_LOG_CAPACITY;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Overrides the data directory.
pub const DATA_DIR_ENV: &str = "GROPIUS_DATA_DIR";
/// Overrides the prompts directory.
pub const PROMPTS_DIR_ENV: &str = "GROPIUS_PROMPTS_DIR";
/// Overrides the source snapshot directory.
pub const SOURCES_DIR_ENV: &str = "GROPIUS_SOURCES_DIR";
/// Overrides the tool executable.
pub const TOOL_PROGRAM_ENV: &str = "GROPIUS_TOOL_PROGRAM";
/// Overrides the per-prompt timeout, in seconds.
pub const PROMPT_TIMEOUT_ENV: &str = "GROPIUS_PROMPT_TIMEOUT_SECS";
/// Overrides the per-task log capacity.
pub const LOG_CAPACITY_ENV: &str = "GROPIUS_LOG_CAPACITY";

/// Default per-prompt timeout in seconds.
pub const DEFAULT_PROMPT_TIMEOUT_SECS: u64 = 1800;

/// Errors raised while loading configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: Arc<std::io::Error>,
    },
    /// The configuration file is not valid JSON for this schema.
    #[error("failed to parse config file {path}: {message}")]
    Parse {
        /// File path.
        path: Utf8PathBuf,
        /// Parser message.
        message: String,
    },
    /// A setting has an unusable value.
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        /// Setting or environment variable name.
        name: String,
        /// Rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(name: &str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.to_owned(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Settings shared by the service and the command-line interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Root of persisted jobs and task folders.
    pub data_dir: Utf8PathBuf,
    /// Root of the prompt tree and optional `registry.json`.
    pub prompts_dir: Utf8PathBuf,
    /// Root of source snapshots resolved by source reference.
    pub sources_dir: Utf8PathBuf,
    /// External tool invocation.
    pub tool: ToolCommand,
    /// Deadline for one prompt invocation, in seconds.
    pub prompt_timeout_secs: u64,
    /// Log entries retained per task.
    pub log_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            data_dir: Utf8PathBuf::from("data"),
            prompts_dir: Utf8PathBuf::from("prompts"),
            sources_dir: Utf8PathBuf::from("data/sources"),
            tool: ToolCommand::default(),
            prompt_timeout_secs: DEFAULT_PROMPT_TIMEOUT_SECS,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl OrchestratorConfig {
    /// Loads defaults, overlays `file` when given, then the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, or a
    /// value is invalid.
    pub fn load(file: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        let base = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Reads defaults overlaid with the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for malformed variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Reads a JSON configuration file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let read_error = |err: std::io::Error| ConfigError::Read {
            path: path.to_path_buf(),
            source: Arc::new(err),
        };
        let parent = path
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let file_name = path.file_name().ok_or_else(|| {
            read_error(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path has no file name",
            ))
        })?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_error)?;
        let mut contents = String::new();
        dir.open(file_name)
            .and_then(|mut file| file.read_to_string(&mut contents))
            .map_err(read_error)?;
        let config: Self = serde_json::from_str(&contents).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        config.validated()
    }

    /// Applies `GROPIUS_*` overrides looked up through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for malformed values.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(DATA_DIR_ENV) {
            self.data_dir = Utf8PathBuf::from(value);
        }
        if let Some(value) = lookup(PROMPTS_DIR_ENV) {
            self.prompts_dir = Utf8PathBuf::from(value);
        }
        if let Some(value) = lookup(SOURCES_DIR_ENV) {
            self.sources_dir = Utf8PathBuf::from(value);
        }
        if let Some(value) = lookup(TOOL_PROGRAM_ENV) {
            self.tool.program = value;
        }
        if let Some(value) = lookup(PROMPT_TIMEOUT_ENV) {
            self.prompt_timeout_secs = parse_positive(PROMPT_TIMEOUT_ENV, &value)?;
        }
        if let Some(value) = lookup(LOG_CAPACITY_ENV) {
            let capacity = parse_positive(LOG_CAPACITY_ENV, &value)?;
            self.log_capacity = usize::try_from(capacity).map_err(|_| {
                ConfigError::invalid(LOG_CAPACITY_ENV, value.as_str(), "out of range")
            })?;
        }
        self.validated()
    }

    /// Returns the per-prompt deadline.
    #[must_use]
    pub const fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_secs)
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.tool.program.trim().is_empty() {
            return Err(ConfigError::invalid("tool.program", "", "must not be empty"));
        }
        if self.prompt_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "prompt_timeout_secs",
                "0",
                "must be positive",
            ));
        }
        if self.log_capacity == 0 {
            return Err(ConfigError::invalid("log_capacity", "0", "must be positive"));
        }
        Ok(self)
    }
}

fn parse_positive(name: &str, raw: &str) -> Result<u64, ConfigError> {
    let parsed: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(name, raw, "expected a positive integer"))?;
    if parsed == 0 {
        return Err(ConfigError::invalid(name, raw, "must be positive"));
    }
    Ok(parsed)
}
