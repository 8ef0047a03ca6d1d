//! Collaborator ports consumed by the task execution service.

mod credential;
mod source;

pub use credential::{CredentialError, CredentialProvider, Secret};
pub use source::{SourceError, SourceProvider};

#[cfg(test)]
pub use credential::MockCredentialProvider;
#[cfg(test)]
pub use source::MockSourceProvider;
