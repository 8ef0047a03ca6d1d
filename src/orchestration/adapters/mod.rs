//! Collaborator adapters.

mod credential;
mod source;

pub use credential::InMemoryCredentialProvider;
pub use source::DirectorySourceProvider;
