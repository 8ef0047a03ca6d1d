//! Job store service: creation, lookup and per-task mutation.

use crate::job::{
    domain::{
        ConfigPatch, Execution, Job, JobDomainError, JobId, JobSpec, Task, TaskKey, TaskStatus,
    },
    ports::{JobRepository, JobRepositoryError},
};
use crate::keyed_lock::KeyedLocks;
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Service-level errors for job store operations.
#[derive(Debug, Error)]
pub enum JobStoreError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] JobDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] JobRepositoryError),
    /// The job does not exist.
    #[error("job not found: {0}")]
    JobNotFound(JobId),
}

/// Result type for job store operations.
pub type JobStoreResult<T> = Result<T, JobStoreError>;

/// Job store orchestration service.
///
/// Mutations of one task are serialized by a per-task lock; mutations of
/// different tasks proceed independently.
pub struct JobStoreService<R, C>
where
    R: JobRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
    task_locks: Arc<KeyedLocks<TaskKey>>,
}

impl<R, C> Clone for JobStoreService<R, C>
where
    R: JobRepository,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            clock: Arc::clone(&self.clock),
            task_locks: Arc::clone(&self.task_locks),
        }
    }
}

impl<R, C> JobStoreService<R, C>
where
    R: JobRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new job store service.
    #[must_use]
    pub fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self {
            repository,
            clock,
            task_locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Returns the clock used for domain timestamps.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Creates and stores a job.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::Domain`] when the spec is invalid or
    /// [`JobStoreError::Repository`] when persistence fails.
    pub async fn create_job(&self, spec: JobSpec) -> JobStoreResult<Job> {
        let job = Job::create(spec, &*self.clock)?;
        self.repository.store(&job).await?;
        debug!(job_id = %job.id(), stages = job.stages().len(), "job created");
        Ok(job)
    }

    /// Retrieves a job.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::JobNotFound`] when the job does not exist.
    pub async fn get_job(&self, id: JobId) -> JobStoreResult<Job> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(JobStoreError::JobNotFound(id))
    }

    /// Lists all jobs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::Repository`] when persistence fails.
    pub async fn list_jobs(&self) -> JobStoreResult<Vec<Job>> {
        Ok(self.repository.list().await?)
    }

    /// Retrieves a single task.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::JobNotFound`] or a domain lookup error.
    pub async fn get_task(&self, key: &TaskKey) -> JobStoreResult<Task> {
        let job = self.get_job(key.job_id).await?;
        Ok(job.task(&key.stage_id, key.task_index)?.clone())
    }

    /// Merges a configuration patch into a task. `null` values remove keys.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError`] when the task does not exist or persistence
    /// fails.
    pub async fn update_task_config(
        &self,
        key: &TaskKey,
        patch: ConfigPatch,
    ) -> JobStoreResult<Task> {
        self.mutate_task(key, |task, clock| {
            task.patch_config(patch, clock);
            Ok(())
        })
        .await
    }

    /// Moves a task through the status state machine.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::Domain`] with
    /// [`JobDomainError::InvalidStatusTransition`] for illegal moves.
    pub async fn set_task_status(
        &self,
        key: &TaskKey,
        status: TaskStatus,
    ) -> JobStoreResult<Task> {
        self.mutate_task(key, |task, clock| task.transition_to(key, status, clock))
            .await
    }

    /// Appends a finished execution and moves the task out of `running` in
    /// one write.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::Domain`] when the task is not running.
    pub async fn record_execution(
        &self,
        key: &TaskKey,
        execution: Execution,
    ) -> JobStoreResult<Task> {
        self.mutate_task(key, |task, clock| {
            task.record_execution(key, execution, clock)
        })
        .await
    }

    /// Removes a job record.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::JobNotFound`] when the job does not exist.
    pub async fn delete_job(&self, id: JobId) -> JobStoreResult<()> {
        match self.repository.delete(id).await {
            Ok(()) => Ok(()),
            Err(JobRepositoryError::NotFound(missing)) => Err(JobStoreError::JobNotFound(missing)),
            Err(err) => Err(err.into()),
        }
    }

    async fn mutate_task<F>(&self, key: &TaskKey, mutate: F) -> JobStoreResult<Task>
    where
        F: FnOnce(&mut Task, &C) -> Result<(), JobDomainError>,
    {
        let _guard = self.task_locks.acquire(key).await;
        let mut task = self.get_task(key).await?;
        mutate(&mut task, &*self.clock)?;
        self.repository
            .update_task(key.job_id, &key.stage_id, &task)
            .await?;
        debug!(task = %key, status = %task.status(), "task updated");
        Ok(task)
    }
}
