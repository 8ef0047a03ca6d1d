//! Job repository storing one JSON document per job.
//!
//! Layout: `{root}/jobs/{job_id}/job.json`. Every write goes through a
//! temporary file and a rename, and read-modify-write cycles on one job are
//! serialized by a per-job lock.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use uuid::Uuid;

use crate::fs_utils::{open_dir, write_atomic};
use crate::job::{
    domain::{Job, JobId, StageId, Task},
    ports::{JobRepository, JobRepositoryError, JobRepositoryResult},
};
use crate::keyed_lock::KeyedLocks;

const JOB_FILE: &str = "job.json";

/// File-backed job repository.
///
/// Filesystem access runs on tokio's blocking pool.
#[derive(Debug)]
pub struct JsonFileJobRepository {
    root: Utf8PathBuf,
    locks: KeyedLocks<JobId>,
}

impl JsonFileJobRepository {
    /// Creates a repository rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: data_dir.into(),
            locks: KeyedLocks::new(),
        }
    }

    fn jobs_dir(&self) -> Utf8PathBuf {
        self.root.join("jobs")
    }

    fn job_file(&self, id: JobId) -> Utf8PathBuf {
        job_file(&self.jobs_dir(), id)
    }
}

fn job_file(jobs_dir: &Utf8Path, id: JobId) -> Utf8PathBuf {
    jobs_dir.join(id.to_string()).join(JOB_FILE)
}

fn read_job(path: &Utf8Path) -> JobRepositoryResult<Option<Job>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(JobRepositoryError::persistence(err)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(JobRepositoryError::persistence)
}

fn write_job(path: &Utf8Path, job: &Job) -> JobRepositoryResult<()> {
    let encoded = serde_json::to_vec_pretty(job).map_err(JobRepositoryError::persistence)?;
    write_atomic(path, &encoded).map_err(JobRepositoryError::persistence)
}

fn list_jobs(jobs_dir: &Utf8Path) -> JobRepositoryResult<Vec<Job>> {
    let dir = match open_dir(jobs_dir) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(JobRepositoryError::persistence(err)),
    };

    let mut jobs = Vec::new();
    for item in dir.entries().map_err(JobRepositoryError::persistence)? {
        let entry = item.map_err(JobRepositoryError::persistence)?;
        let name = entry.file_name().map_err(JobRepositoryError::persistence)?;
        let Ok(uuid) = Uuid::parse_str(&name) else {
            continue;
        };
        if let Some(job) = read_job(&job_file(jobs_dir, JobId::from_uuid(uuid)))? {
            jobs.push(job);
        }
    }
    jobs.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    Ok(jobs)
}

async fn blocking<T, F>(work: F) -> JobRepositoryResult<T>
where
    F: FnOnce() -> JobRepositoryResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(JobRepositoryError::persistence)?
}

#[async_trait]
impl JobRepository for JsonFileJobRepository {
    async fn store(&self, job: &Job) -> JobRepositoryResult<()> {
        let _guard = self.locks.acquire(&job.id()).await;
        let path = self.job_file(job.id());
        let created = job.clone();
        blocking(move || {
            if path.exists() {
                return Err(JobRepositoryError::DuplicateJob(created.id()));
            }
            write_job(&path, &created)
        })
        .await
    }

    async fn find_by_id(&self, id: JobId) -> JobRepositoryResult<Option<Job>> {
        let path = self.job_file(id);
        blocking(move || read_job(&path)).await
    }

    async fn list(&self) -> JobRepositoryResult<Vec<Job>> {
        let jobs_dir = self.jobs_dir();
        blocking(move || list_jobs(&jobs_dir)).await
    }

    async fn update_task(
        &self,
        job_id: JobId,
        stage_id: &StageId,
        task: &Task,
    ) -> JobRepositoryResult<Job> {
        let _guard = self.locks.acquire(&job_id).await;
        let path = self.job_file(job_id);
        let (stage, updated) = (stage_id.clone(), task.clone());
        blocking(move || {
            let mut job = read_job(&path)?.ok_or(JobRepositoryError::NotFound(job_id))?;
            job.replace_task(&stage, updated)?;
            write_job(&path, &job)?;
            Ok(job)
        })
        .await
    }

    async fn delete(&self, id: JobId) -> JobRepositoryResult<()> {
        let _guard = self.locks.acquire(&id).await;
        let path = self.job_file(id);
        blocking(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(JobRepositoryError::NotFound(id))
            }
            Err(err) => Err(JobRepositoryError::persistence(err)),
        })
        .await
    }
}
