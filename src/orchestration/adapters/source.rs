//! Source snapshots stored as directories under a common root.

use crate::orchestration::ports::{SourceError, SourceProvider};
use async_trait::async_trait;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Resolves `source_ref` to `{sources_dir}/{source_ref}`.
///
/// Absolute references are used as-is. Relative references may not contain
/// `..` components.
#[derive(Debug, Clone)]
pub struct DirectorySourceProvider {
    sources_dir: Utf8PathBuf,
}

impl DirectorySourceProvider {
    /// Creates a provider rooted at `sources_dir`.
    #[must_use]
    pub fn new(sources_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            sources_dir: sources_dir.into(),
        }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn sources_dir(&self) -> &Utf8Path {
        &self.sources_dir
    }

    fn resolve(&self, source_ref: &str) -> Result<Utf8PathBuf, SourceError> {
        let trimmed = source_ref.trim();
        if trimmed.is_empty() {
            return Err(SourceError::InvalidReference(source_ref.to_owned()));
        }
        let reference = Utf8Path::new(trimmed);
        if reference.is_absolute() {
            return Ok(reference.to_path_buf());
        }
        let escapes = reference
            .components()
            .any(|component| matches!(component, Utf8Component::ParentDir));
        if escapes {
            return Err(SourceError::InvalidReference(source_ref.to_owned()));
        }
        Ok(self.sources_dir.join(reference))
    }
}

#[async_trait]
impl SourceProvider for DirectorySourceProvider {
    async fn read_source_snapshot(&self, source_ref: &str) -> Result<Utf8PathBuf, SourceError> {
        let path = self.resolve(source_ref)?;
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Ok(path),
            Ok(false) => Err(SourceError::NotFound(path.into_string())),
            Err(err) => Err(SourceError::provider(err)),
        }
    }
}
