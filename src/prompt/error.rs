//! Errors raised while loading registries and resolving prompt sequences.

use crate::job::domain::{AgentName, CapabilityName, JobDomainError};
use camino::Utf8PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Configuration errors from the prompt orchestrator.
#[derive(Debug, Clone, Error)]
pub enum PromptError {
    /// No sequence is registered for the agent/capability pair.
    #[error("no prompts found for {agent}/{capability}")]
    NoSequence {
        /// Requested agent.
        agent: AgentName,
        /// Requested capability.
        capability: CapabilityName,
    },

    /// One or more referenced prompt files do not exist.
    #[error("prompt files not found: {}", format_paths(.0))]
    MissingPromptFiles(Vec<Utf8PathBuf>),

    /// The sequence resolved to no prompts (for example only target steps
    /// and no targets selected).
    #[error("prompt sequence for {agent}/{capability} resolved to no prompts")]
    EmptySequence {
        /// Requested agent.
        agent: AgentName,
        /// Requested capability.
        capability: CapabilityName,
    },

    /// A registry entry names a file that is not a plain file name.
    #[error("invalid prompt file name in registry: '{0}'")]
    InvalidPromptFile(String),

    /// A registry agent or capability name is invalid.
    #[error(transparent)]
    InvalidName(#[from] JobDomainError),

    /// The registry document could not be parsed.
    #[error("invalid prompt registry: {0}")]
    InvalidRegistry(String),

    /// A registry or prompt file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying error.
        source: Arc<std::io::Error>,
    },
}

impl PromptError {
    /// Wraps an I/O error for `path`.
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

fn format_paths(paths: &[Utf8PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
