//! Task execution service: execute, poll logs and list task files.

use super::{
    ContextSources, ExecutionError, ExecutionLease, ExecutionLockRegistry, ExecutionReport,
    ExecutionResult, base_context, prompt_context,
    ports::{CredentialProvider, SourceProvider},
};
use super::adapters::DirectorySourceProvider;
use crate::config::OrchestratorConfig;
use crate::execution::{CliPromptRunner, PromptRunRequest, PromptRunner};
use crate::job::domain::{
    Execution, ExecutionFailure, ExecutionId, FailureKind, Job, JobId, PromptResult, Task,
    TaskKey, TaskStatus,
};
use crate::job::ports::JobRepository;
use crate::job::services::{JobStoreError, JobStoreService};
use crate::logs::{ExecutionLogStore, LogEntry, TaskLog};
use crate::prompt::{
    PromptDescriptor, PromptError, PromptOrchestrator, TemplateContext, render,
    unresolved_placeholders,
};
use crate::workspace::{
    ExecutionArtifacts, FolderTree, PromptTranscript, TaskFolders, WorkspaceManager,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

/// Default deadline for one prompt invocation.
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(1800);

/// Collaborators used by [`TaskExecutionService`].
#[derive(Clone)]
pub struct ExecutionComponents {
    /// Task folder manager.
    pub workspace: WorkspaceManager,
    /// Prompt sequence resolution.
    pub orchestrator: Arc<PromptOrchestrator>,
    /// Runs rendered prompts.
    pub runner: Arc<dyn PromptRunner>,
    /// Supplies source snapshots.
    pub sources: Arc<dyn SourceProvider>,
    /// Resolves credentials named by task configuration.
    pub credentials: Arc<dyn CredentialProvider>,
    /// Process-wide execution log.
    pub logs: Arc<ExecutionLogStore>,
}

impl ExecutionComponents {
    /// Wires the file, process and directory collaborators described by
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when `{prompts_dir}/registry.json` exists but
    /// cannot be loaded.
    pub fn from_config<C>(
        config: &OrchestratorConfig,
        credentials: Arc<dyn CredentialProvider>,
        clock: Arc<C>,
    ) -> Result<Self, PromptError>
    where
        C: Clock + Send + Sync + 'static,
    {
        Ok(Self {
            workspace: WorkspaceManager::new(&config.data_dir),
            orchestrator: Arc::new(PromptOrchestrator::load(config.prompts_dir.clone())?),
            runner: Arc::new(CliPromptRunner::new(config.tool.clone(), Arc::clone(&clock))),
            sources: Arc::new(DirectorySourceProvider::new(config.sources_dir.clone())),
            credentials,
            logs: Arc::new(ExecutionLogStore::new(config.log_capacity, clock)),
        })
    }
}

impl fmt::Debug for ExecutionComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionComponents")
            .field("workspace", &self.workspace)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

/// Executes tasks one prompt sequence at a time.
///
/// Each task key runs at most one execution at a time; a second request for
/// a running task fails with [`ExecutionError::ConcurrentExecution`] instead
/// of queuing. Every execution runs on a detached supervisor task that owns
/// the task's lock, so the lock outlives a cancelled caller and is released
/// only when the execution has been recorded. The body runs on a further
/// task so that a panic still leaves a failed execution on record.
/// Filesystem work runs on the blocking pool.
pub struct TaskExecutionService<R, C>
where
    R: JobRepository,
    C: Clock + Send + Sync,
{
    store: JobStoreService<R, C>,
    components: ExecutionComponents,
    locks: ExecutionLockRegistry,
    prompt_timeout: Duration,
}

impl<R, C> Clone for TaskExecutionService<R, C>
where
    R: JobRepository,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            components: self.components.clone(),
            locks: self.locks.clone(),
            prompt_timeout: self.prompt_timeout,
        }
    }
}

struct Plan {
    descriptors: Vec<PromptDescriptor>,
    context: TemplateContext,
}

#[derive(Default)]
struct RunRecord {
    results: Vec<PromptResult>,
    transcripts: Vec<PromptTranscript>,
}

fn failure(kind: FailureKind, message: impl fmt::Display) -> ExecutionFailure {
    ExecutionFailure {
        kind,
        message: message.to_string(),
    }
}

async fn blocking<T, F>(work: F) -> Result<T, JoinError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await
}

/// Runs fallible filesystem work on the blocking pool, classifying any
/// error as `kind`.
async fn blocking_step<T, E, F>(kind: FailureKind, work: F) -> Result<T, ExecutionFailure>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    blocking(work)
        .await
        .map_err(|err| failure(kind, err))?
        .map_err(|err| failure(kind, err))
}

impl<R, C> TaskExecutionService<R, C>
where
    R: JobRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a service over `store` and `components`.
    #[must_use]
    pub fn new(store: JobStoreService<R, C>, components: ExecutionComponents) -> Self {
        Self {
            store,
            components,
            locks: ExecutionLockRegistry::new(),
            prompt_timeout: DEFAULT_PROMPT_TIMEOUT,
        }
    }

    /// Sets the per-prompt deadline.
    #[must_use]
    pub const fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    /// Returns the job store.
    #[must_use]
    pub const fn store(&self) -> &JobStoreService<R, C> {
        &self.store
    }

    /// Returns the prompt orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &PromptOrchestrator {
        &self.components.orchestrator
    }

    /// Executes a task and waits for the outcome.
    ///
    /// Configuration, filesystem, process and tool failures produce a report
    /// with `status = failed`. Dropping the returned future does not stop
    /// the execution: it finishes in the background and keeps the task
    /// locked until then.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::ConcurrentExecution`] when the task is
    /// already executing, [`ExecutionError::Store`] when the task does not
    /// exist or its record cannot be updated, or
    /// [`ExecutionError::Interrupted`] when the runtime stops the supervisor.
    pub async fn execute(&self, key: &TaskKey) -> ExecutionResult<ExecutionReport> {
        self.start_execution(key)?.await?
    }

    /// Acquires the task's lock and starts the execution in the background.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::ConcurrentExecution`] when the task is
    /// already executing. The lock is held from this call until the
    /// execution is recorded, whether or not the handle is awaited.
    pub fn start_execution(
        &self,
        key: &TaskKey,
    ) -> ExecutionResult<JoinHandle<ExecutionResult<ExecutionReport>>> {
        let lease = self.acquire(key)?;
        let service = self.clone();
        Ok(tokio::spawn(async move {
            service.supervise(lease, ExecutionId::new()).await
        }))
    }

    /// Returns `true` while an execution of `key` holds its lock.
    #[must_use]
    pub fn is_running(&self, key: &TaskKey) -> bool {
        self.locks.is_locked(key)
    }

    /// Returns every retained log entry for the task.
    #[must_use]
    pub fn get_logs(&self, key: &TaskKey) -> Vec<LogEntry> {
        self.components.logs.logs(key)
    }

    /// Returns log entries newer than `after`, for incremental polling.
    #[must_use]
    pub fn get_logs_since(&self, key: &TaskKey, after: u64) -> Vec<LogEntry> {
        self.components.logs.logs_since(key, after)
    }

    /// Lists the task's `input/`, `output/` and `data/` trees.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Store`] when the task does not exist or
    /// [`ExecutionError::Workspace`] when a folder cannot be read.
    pub async fn list_files(&self, key: &TaskKey) -> ExecutionResult<FolderTree> {
        let task = self.store.get_task(key).await?;
        let workspace = self.components.workspace.clone();
        let folders = workspace.locate(key, task.name());
        Ok(blocking(move || workspace.list_files(&folders)).await??)
    }

    /// Deletes a job, its task folders and its log buffers.
    ///
    /// The locks of every task are held for the whole deletion, so no
    /// execution can start against a half-deleted job.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::JobBusy`] while any task of the job is
    /// executing, [`ExecutionError::Store`] when the job does not exist, or
    /// [`ExecutionError::Workspace`] when its folders cannot be removed.
    pub async fn delete_job(&self, job_id: JobId) -> ExecutionResult<()> {
        let job = self.store.get_job(job_id).await?;
        let keys: Vec<TaskKey> = job.task_keys().collect();
        let Some(leases) = self.locks.try_acquire_all(&keys) else {
            warn!(job_id = %job_id, "deletion refused: job has running executions");
            return Err(ExecutionError::JobBusy(job_id));
        };
        self.store.delete_job(job_id).await?;
        let workspace = self.components.workspace.clone();
        blocking(move || workspace.remove_job(job_id)).await??;
        self.components.logs.forget_job(job_id);
        drop(leases);
        info!(job_id = %job_id, "job deleted");
        Ok(())
    }

    fn acquire(&self, key: &TaskKey) -> ExecutionResult<ExecutionLease> {
        self.locks.try_acquire(key).ok_or_else(|| {
            warn!(task = %key, "execution refused: task already running");
            ExecutionError::ConcurrentExecution(key.clone())
        })
    }

    /// Owns `lease` for the whole execution, including crash recovery.
    async fn supervise(
        &self,
        lease: ExecutionLease,
        execution_id: ExecutionId,
    ) -> ExecutionResult<ExecutionReport> {
        let key = lease.key().clone();
        let started_at = self.store.clock().utc();
        let worker = self.clone();
        let worker_key = key.clone();
        let body = tokio::spawn(async move {
            worker
                .run_execution(&worker_key, execution_id, started_at)
                .await
        });
        let outcome = match body.await {
            Ok(outcome) => outcome,
            Err(err) => self.recover(&key, execution_id, started_at, &err).await,
        };
        drop(lease);
        outcome
    }

    async fn run_execution(
        &self,
        key: &TaskKey,
        execution_id: ExecutionId,
        started_at: DateTime<Utc>,
    ) -> ExecutionResult<ExecutionReport> {
        let job = self.store.get_job(key.job_id).await?;
        let task = job
            .task(&key.stage_id, key.task_index)
            .map_err(JobStoreError::from)?
            .clone();
        let log = self.task_log(key, execution_id);

        if task.status() == TaskStatus::Running {
            warn!(task = %key, "task was left running by an earlier process");
            log.warn("previous execution did not finish; starting a new one");
        } else {
            self.store.set_task_status(key, TaskStatus::Running).await?;
        }
        info!(
            job_id = %key.job_id,
            stage_id = %key.stage_id,
            task_index = %key.task_index,
            execution_id = %execution_id,
            agent = %task.agent(),
            capability = %task.capability(),
            "execution started"
        );
        log.info(&format!(
            "execution {execution_id} started: {}/{}",
            task.agent(),
            task.capability()
        ));

        let mut run = RunRecord::default();
        let workspace = self.components.workspace.clone();
        let (folder_key, task_name) = (key.clone(), task.name().to_owned());
        let ensured = blocking_step(FailureKind::Filesystem, move || {
            workspace.ensure_task_folders(&folder_key, &task_name)
        })
        .await;
        let (folders, aborted) = match ensured {
            Ok(folders) => {
                let prepared = self
                    .prepare(&job, &task, key, execution_id, &folders, &log)
                    .await;
                let aborted = match prepared {
                    Ok(plan) => {
                        self.run_sequence(&plan, &folders, execution_id, &log, &mut run)
                            .await
                    }
                    Err(abort) => Some(abort),
                };
                (Some(folders), aborted)
            }
            Err(abort) => (None, Some(abort)),
        };
        if let Some(abort) = &aborted {
            log.error(&format!("execution aborted ({}): {}", abort.kind, abort.message));
        }

        let mut execution = Execution {
            execution_id,
            status: Execution::derive_status(&run.results, aborted.as_ref()),
            prompt_results: run.results,
            failure: aborted,
            started_at,
            finished_at: self.store.clock().utc(),
        };
        let output_dir = match folders {
            Some(task_folders) => {
                self.persist(key, &task, task_folders, &mut execution, run.transcripts, &log)
                    .await
            }
            None => None,
        };

        self.store.record_execution(key, execution.clone()).await?;
        let succeeded = execution
            .prompt_results
            .iter()
            .filter(|result| result.is_success())
            .count();
        let summary = format!(
            "execution {execution_id} {}: {succeeded}/{} prompts succeeded",
            execution.status.as_str(),
            execution.prompt_results.len()
        );
        info!(
            task = %key,
            execution_id = %execution_id,
            status = execution.status.as_str(),
            "execution finished"
        );
        if execution.failure.is_some() || succeeded < execution.prompt_results.len() {
            log.error(&summary);
        } else {
            log.info(&summary);
        }
        Ok(ExecutionReport::new(key.clone(), &execution, output_dir))
    }

    async fn prepare(
        &self,
        job: &Job,
        task: &Task,
        key: &TaskKey,
        execution_id: ExecutionId,
        folders: &TaskFolders,
        log: &TaskLog,
    ) -> Result<Plan, ExecutionFailure> {
        let stage = job
            .stage(&key.stage_id)
            .ok_or_else(|| failure(FailureKind::Configuration, "stage not found"))?;
        let targets = job
            .effective_targets(&key.stage_id, key.task_index)
            .map_err(|err| failure(FailureKind::Configuration, err))?;

        let source = self
            .components
            .sources
            .read_source_snapshot(job.source_ref())
            .await
            .map_err(|err| failure(FailureKind::Filesystem, err))?;
        log.info(&format!("copying source snapshot {source} into input/"));
        let workspace = self.components.workspace.clone();
        let staged = folders.clone();
        blocking_step(FailureKind::Filesystem, move || {
            workspace.populate_input(&staged, &source)
        })
        .await?;

        let descriptors = self
            .components
            .orchestrator
            .resolve_sequence(task.agent(), task.capability(), &targets)
            .map_err(|err| failure(FailureKind::Configuration, err))?;
        let names: Vec<&str> = descriptors
            .iter()
            .map(|descriptor| descriptor.display_name.as_str())
            .collect();
        log.info(&format!(
            "resolved {} prompts: {}",
            descriptors.len(),
            names.join(", ")
        ));

        let credential = match task.config().credential_id() {
            Some(credential_id) => Some(
                self.components
                    .credentials
                    .resolve(credential_id)
                    .await
                    .map_err(|err| failure(FailureKind::Configuration, err))?,
            ),
            None => None,
        };
        let context = base_context(ContextSources {
            job,
            stage,
            task,
            targets: &targets,
            execution_id,
            folders,
            credential: credential.as_ref(),
        });
        Ok(Plan {
            descriptors,
            context,
        })
    }

    async fn run_sequence(
        &self,
        plan: &Plan,
        folders: &TaskFolders,
        execution_id: ExecutionId,
        log: &TaskLog,
        run: &mut RunRecord,
    ) -> Option<ExecutionFailure> {
        let total = plan.descriptors.len();
        for descriptor in &plan.descriptors {
            log.info(&format!(
                "[{}/{total}] {} ({})",
                descriptor.position, descriptor.display_name, descriptor.purpose
            ));
            let orchestrator = Arc::clone(&self.components.orchestrator);
            let wanted = descriptor.clone();
            let text = match blocking_step(FailureKind::Configuration, move || {
                orchestrator.read_prompt(&wanted)
            })
            .await
            {
                Ok(text) => text,
                Err(abort) => return Some(abort),
            };
            let context = prompt_context(&plan.context, descriptor.target.as_ref());
            for name in unresolved_placeholders(&text, &context) {
                warn!(prompt = %descriptor.display_name, placeholder = %name, "unresolved placeholder");
                log.warn(&format!(
                    "unresolved placeholder {{{{{name}}}}} in {}",
                    descriptor.display_name
                ));
            }
            let rendered = render(&text, &context);
            let workspace = self.components.workspace.clone();
            let (task_folders, written, contents) =
                (folders.clone(), descriptor.clone(), rendered.clone());
            let prompt_path = match blocking_step(FailureKind::Filesystem, move || {
                workspace.write_rendered_prompt(&task_folders, execution_id, &written, &contents)
            })
            .await
            {
                Ok(path) => path,
                Err(abort) => return Some(abort),
            };

            let report = self
                .components
                .runner
                .run_prompt(PromptRunRequest {
                    descriptor,
                    rendered: &rendered,
                    prompt_path: &prompt_path,
                    working_dir: &folders.input_dir,
                    timeout: self.prompt_timeout,
                    log,
                })
                .await;
            run.transcripts.push(PromptTranscript {
                stem: descriptor.artifact_stem(),
                prompt_file: descriptor.display_name.clone(),
                body: report.transcript,
            });
            let aborts = report.result.aborts_sequence();
            if let Some(error) = &report.result.error {
                log.warn(&format!("{} failed: {error}", descriptor.display_name));
            }
            run.results.push(report.result);
            if aborts {
                log.error("stopping prompt sequence after hard failure");
                return None;
            }
        }
        None
    }

    async fn persist(
        &self,
        key: &TaskKey,
        task: &Task,
        folders: TaskFolders,
        execution: &mut Execution,
        transcripts: Vec<PromptTranscript>,
        log: &TaskLog,
    ) -> Option<camino::Utf8PathBuf> {
        let workspace = self.components.workspace.clone();
        let (artifact_key, task_name, finished) =
            (key.clone(), task.name().to_owned(), execution.clone());
        let persisted = blocking_step(FailureKind::Filesystem, move || {
            let artifacts = ExecutionArtifacts {
                key: &artifact_key,
                task_name: &task_name,
                execution: &finished,
                transcripts: &transcripts,
            };
            workspace.persist_outputs(&folders, &artifacts)
        })
        .await;
        match persisted {
            Ok(dir) => {
                log.info(&format!("outputs written to {dir}"));
                Some(dir)
            }
            Err(abort) => {
                error!(task = %key, error = %abort.message, "failed to persist execution outputs");
                log.error(&format!("failed to persist outputs: {}", abort.message));
                if execution.failure.is_none() {
                    execution.failure = Some(abort);
                    execution.status = Execution::derive_status(
                        &execution.prompt_results,
                        execution.failure.as_ref(),
                    );
                }
                None
            }
        }
    }

    async fn recover(
        &self,
        key: &TaskKey,
        execution_id: ExecutionId,
        started_at: DateTime<Utc>,
        err: &JoinError,
    ) -> ExecutionResult<ExecutionReport> {
        let message = if err.is_panic() {
            "execution crashed unexpectedly"
        } else {
            "execution was cancelled"
        };
        error!(task = %key, execution_id = %execution_id, "{message}");
        self.task_log(key, execution_id).error(message);

        let crashed = failure(FailureKind::Process, message);
        let execution = Execution {
            execution_id,
            status: Execution::derive_status(&[], Some(&crashed)),
            prompt_results: Vec::new(),
            failure: Some(crashed),
            started_at,
            finished_at: self.store.clock().utc(),
        };
        let task = self.store.get_task(key).await?;
        if task.status() == TaskStatus::Running {
            self.store.record_execution(key, execution.clone()).await?;
        }
        Ok(ExecutionReport::new(key.clone(), &execution, None))
    }

    fn task_log(&self, key: &TaskKey, execution_id: ExecutionId) -> TaskLog {
        TaskLog::new(
            Arc::clone(&self.components.logs),
            key.clone(),
            Some(execution_id),
        )
    }
}
