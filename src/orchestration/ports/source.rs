//! Port resolving a job's source reference to a readable snapshot.

use async_trait::async_trait;
use camino::Utf8PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while resolving a source reference.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// No snapshot exists for the reference.
    #[error("source not found: {0}")]
    NotFound(String),
    /// The reference is malformed or escapes the source root.
    #[error("invalid source reference: {0}")]
    InvalidReference(String),
    /// The provider failed.
    #[error("source provider error: {0}")]
    Provider(Arc<dyn std::error::Error + Send + Sync>),
}

impl SourceError {
    /// Wraps a provider failure.
    pub fn provider(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Provider(Arc::new(err))
    }
}

/// Supplies read-only source snapshots for task inputs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Returns the filesystem path holding the snapshot for `source_ref`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the reference cannot be resolved.
    async fn read_source_snapshot(&self, source_ref: &str) -> Result<Utf8PathBuf, SourceError>;
}
