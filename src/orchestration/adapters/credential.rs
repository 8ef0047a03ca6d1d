//! In-memory credential provider.

use crate::orchestration::ports::{CredentialError, CredentialProvider, Secret};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory credential map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialProvider {
    secrets: Arc<RwLock<HashMap<String, Secret>>>,
}

impl InMemoryCredentialProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `secret` under `credential_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Provider`] when the lock is poisoned.
    pub fn insert(
        &self,
        credential_id: impl Into<String>,
        secret: Secret,
    ) -> Result<(), CredentialError> {
        let mut secrets = self
            .secrets
            .write()
            .map_err(|err| CredentialError::provider(std::io::Error::other(err.to_string())))?;
        secrets.insert(credential_id.into(), secret);
        Ok(())
    }
}

#[async_trait]
impl CredentialProvider for InMemoryCredentialProvider {
    async fn resolve(&self, credential_id: &str) -> Result<Secret, CredentialError> {
        let secrets = self
            .secrets
            .read()
            .map_err(|err| CredentialError::provider(std::io::Error::other(err.to_string())))?;
        secrets
            .get(credential_id)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound(credential_id.to_owned()))
    }
}
