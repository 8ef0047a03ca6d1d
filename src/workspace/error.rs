//! Filesystem errors raised by the workspace manager.

use camino::Utf8PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Folder creation, copy and persistence failures.
#[derive(Debug, Clone, Error)]
pub enum WorkspaceError {
    /// The source snapshot could not be read.
    #[error("source {path} is unreadable: {source}")]
    SourceUnreadable {
        /// Source path.
        path: Utf8PathBuf,
        /// Underlying error.
        source: Arc<std::io::Error>,
    },

    /// A workspace path is not valid UTF-8.
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(String),

    /// Any other filesystem operation failed.
    #[error("filesystem operation on {path} failed: {source}")]
    Io {
        /// Path being accessed.
        path: Utf8PathBuf,
        /// Underlying error.
        source: Arc<std::io::Error>,
    },

    /// Swapping in a new snapshot failed and the previous one could not be
    /// moved back into `input/`.
    #[error("input swap failed ({source}); previous snapshot left at {retired}")]
    SnapshotStranded {
        /// Where the previous snapshot now lives.
        retired: Utf8PathBuf,
        /// Error that made the swap fail.
        source: Arc<std::io::Error>,
    },

    /// An artifact could not be encoded.
    #[error("failed to encode {what}: {message}")]
    Encode {
        /// Artifact being encoded.
        what: &'static str,
        /// Encoder message.
        message: String,
    },
}

impl WorkspaceError {
    /// Wraps an I/O error for `path`.
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn unreadable(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::SourceUnreadable {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}
