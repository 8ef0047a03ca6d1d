//! In-memory repository for jobs, used by tests and the CLI's dry runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::job::{
    domain::{Job, JobId, StageId, Task},
    ports::{JobRepository, JobRepositoryError, JobRepositoryResult},
};

/// Thread-safe in-memory job repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobRepository {
    state: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl InMemoryJobRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(err: impl std::fmt::Display) -> JobRepositoryError {
    JobRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn store(&self, job: &Job) -> JobRepositoryResult<()> {
        let mut jobs = self.state.write().map_err(lock_error)?;
        if jobs.contains_key(&job.id()) {
            return Err(JobRepositoryError::DuplicateJob(job.id()));
        }
        jobs.insert(job.id(), job.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: JobId) -> JobRepositoryResult<Option<Job>> {
        let jobs = self.state.read().map_err(lock_error)?;
        Ok(jobs.get(&id).cloned())
    }

    async fn list(&self) -> JobRepositoryResult<Vec<Job>> {
        let jobs = self.state.read().map_err(lock_error)?;
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        all.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(all)
    }

    async fn update_task(
        &self,
        job_id: JobId,
        stage_id: &StageId,
        task: &Task,
    ) -> JobRepositoryResult<Job> {
        let mut jobs = self.state.write().map_err(lock_error)?;
        let job = jobs
            .get_mut(&job_id)
            .ok_or(JobRepositoryError::NotFound(job_id))?;
        job.replace_task(stage_id, task.clone())?;
        Ok(job.clone())
    }

    async fn delete(&self, id: JobId) -> JobRepositoryResult<()> {
        let mut jobs = self.state.write().map_err(lock_error)?;
        jobs.remove(&id)
            .map(|_| ())
            .ok_or(JobRepositoryError::NotFound(id))
    }
}
