//! Repository port for job persistence and per-task updates.

use crate::job::domain::{Job, JobDomainError, JobId, StageId, Task};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for job repository operations.
pub type JobRepositoryResult<T> = Result<T, JobRepositoryError>;

/// Job persistence contract.
///
/// Writes happen at task granularity so that updates to different tasks of
/// the same job never overwrite each other. Readers only ever observe whole
/// task records.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Stores a new job.
    ///
    /// # Errors
    ///
    /// Returns [`JobRepositoryError::DuplicateJob`] when the identifier
    /// already exists.
    async fn store(&self, job: &Job) -> JobRepositoryResult<()>;

    /// Finds a job by identifier.
    ///
    /// Returns `None` when the job does not exist.
    async fn find_by_id(&self, id: JobId) -> JobRepositoryResult<Option<Job>>;

    /// Returns every stored job, newest first.
    async fn list(&self) -> JobRepositoryResult<Vec<Job>>;

    /// Replaces one task of a job and returns the updated job.
    ///
    /// # Errors
    ///
    /// Returns [`JobRepositoryError::NotFound`] when the job does not exist
    /// or [`JobRepositoryError::Domain`] when the stage or task does not.
    async fn update_task(
        &self,
        job_id: JobId,
        stage_id: &StageId,
        task: &Task,
    ) -> JobRepositoryResult<Job>;

    /// Removes a job.
    ///
    /// # Errors
    ///
    /// Returns [`JobRepositoryError::NotFound`] when the job does not exist.
    async fn delete(&self, id: JobId) -> JobRepositoryResult<()>;
}

/// Errors returned by job repository implementations.
#[derive(Debug, Clone, Error)]
pub enum JobRepositoryError {
    /// A job with the same identifier already exists.
    #[error("duplicate job identifier: {0}")]
    DuplicateJob(JobId),

    /// The job was not found.
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// The stored job rejected the update.
    #[error(transparent)]
    Domain(#[from] JobDomainError),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl JobRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
