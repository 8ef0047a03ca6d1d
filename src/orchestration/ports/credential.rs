//! Port resolving credential identifiers to secrets.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A secret value that never prints its contents.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the plaintext. Callers must not log it.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

/// Errors raised while resolving a credential.
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    /// No credential has the identifier.
    #[error("credential not found: {0}")]
    NotFound(String),
    /// The provider failed.
    #[error("credential provider error: {0}")]
    Provider(Arc<dyn std::error::Error + Send + Sync>),
}

impl CredentialError {
    /// Wraps a provider failure.
    pub fn provider(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Provider(Arc::new(err))
    }
}

/// Resolves credential identifiers named in task configuration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns the secret for `credential_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::NotFound`] for unknown identifiers.
    async fn resolve(&self, credential_id: &str) -> Result<Secret, CredentialError>;
}
