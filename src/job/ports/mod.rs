//! Port contracts for job persistence.

pub mod repository;

pub use repository::{JobRepository, JobRepositoryError, JobRepositoryResult};
