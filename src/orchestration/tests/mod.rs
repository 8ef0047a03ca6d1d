//! Unit tests for the task execution service and its collaborators.

mod service_tests;

use crate::execution::{PromptRunReport, PromptRunRequest, PromptRunner};
use crate::job::adapters::memory::InMemoryJobRepository;
use crate::job::domain::{
    FailureKind, Job, JobSpec, PromptResult, PromptStatus, StageId, StageSpec, TaskConfig,
    TaskIndex, TaskKey, TaskSpec,
};
use crate::job::ports::JobRepository;
use crate::job::services::JobStoreService;
use crate::logs::{ExecutionLogStore, LogLevel};
use crate::orchestration::adapters::{DirectorySourceProvider, InMemoryCredentialProvider};
use crate::orchestration::ports::{CredentialProvider, SourceProvider};
use crate::orchestration::{ExecutionComponents, TaskExecutionService};
use crate::prompt::{PromptOrchestrator, PromptRegistry};
use crate::workspace::{WorkspaceManager, content_digest};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use mockable::{Clock, DefaultClock};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

pub(super) type TestService = TaskExecutionService<InMemoryJobRepository, DefaultClock>;

/// One invocation observed by [`ScriptedRunner`].
#[derive(Debug, Clone)]
pub(super) struct RunnerCall {
    pub(super) prompt_file: String,
    pub(super) rendered: String,
    pub(super) working_dir: Utf8PathBuf,
}

/// Prompt runner whose behaviour is driven by markers in the rendered text.
///
/// `HARD_FAIL` fails with a process error, `SOFT_FAIL` with a tool-reported
/// error, `PANIC` panics and `BLOCK` waits for [`ScriptedRunner::release`].
#[derive(Debug)]
pub(super) struct ScriptedRunner {
    calls: Mutex<Vec<RunnerCall>>,
    gate: Semaphore,
}

impl ScriptedRunner {
    pub(super) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
        }
    }

    pub(super) fn calls(&self) -> Vec<RunnerCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(super) fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl PromptRunner for ScriptedRunner {
    async fn run_prompt(&self, request: PromptRunRequest<'_>) -> PromptRunReport {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RunnerCall {
                prompt_file: request.descriptor.display_name.clone(),
                rendered: request.rendered.to_owned(),
                working_dir: request.working_dir.to_path_buf(),
            });
        let started_at = DefaultClock.utc();
        if request.rendered.contains("BLOCK") {
            let permit = self.gate.acquire().await.expect("gate open");
            permit.forget();
        }
        assert!(!request.rendered.contains("PANIC"), "scripted panic");
        request.log.log(LogLevel::Info, "scripted tool output");

        let (status, kind, error) = if request.rendered.contains("HARD_FAIL") {
            (
                PromptStatus::Failed,
                Some(FailureKind::Process),
                Some("tool failed (exit code 1)".to_owned()),
            )
        } else if request.rendered.contains("SOFT_FAIL") {
            (
                PromptStatus::Failed,
                Some(FailureKind::ToolReported),
                Some("tool reported an error".to_owned()),
            )
        } else {
            (PromptStatus::Success, None, None)
        };
        PromptRunReport {
            result: PromptResult {
                prompt_file: request.descriptor.display_name.clone(),
                origin: request.descriptor.origin,
                target_name: request.descriptor.target.clone(),
                status,
                error,
                failure_kind: kind,
                prompt_sha256: Some(content_digest(request.rendered)),
                started_at,
                finished_at: DefaultClock.utc(),
            },
            transcript: format!("transcript for {}", request.descriptor.display_name),
            session_id: None,
        }
    }
}

/// Temporary prompts, sources and data directories plus a wired service.
pub(super) struct Harness {
    _dir: TempDir,
    pub(super) root: Utf8PathBuf,
    pub(super) runner: Arc<ScriptedRunner>,
    pub(super) logs: Arc<ExecutionLogStore>,
    pub(super) service: TestService,
    components: ExecutionComponents,
}

impl Harness {
    pub(super) fn new() -> Self {
        Self::with_collaborators(None, None)
    }

    pub(super) fn with_collaborators(
        sources: Option<Arc<dyn SourceProvider>>,
        credentials: Option<Arc<dyn CredentialProvider>>,
    ) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
        write(&root, "sources/demo/main.py", "print('hello')\n");
        write(
            &root,
            "prompts/code_architect/analyze/01_analyze_codebase.md",
            "Analyse {{job_name}} from {{source_ref}} in {{input_dir}}",
        );
        write(
            &root,
            "prompts/targets/rust/01_analyze.md",
            "Map patterns to {{target_name}}",
        );

        let runner = Arc::new(ScriptedRunner::new());
        let clock: Arc<DefaultClock> = Arc::new(DefaultClock);
        let logs = Arc::new(ExecutionLogStore::new(1000, clock.clone()));
        let store = JobStoreService::new(Arc::new(InMemoryJobRepository::new()), clock);
        let sources: Arc<dyn SourceProvider> = match sources {
            Some(provider) => provider,
            None => Arc::new(DirectorySourceProvider::new(root.join("sources"))),
        };
        let credentials: Arc<dyn CredentialProvider> = match credentials {
            Some(provider) => provider,
            None => Arc::new(InMemoryCredentialProvider::new()),
        };
        let components = ExecutionComponents {
            workspace: WorkspaceManager::new(root.join("data")),
            orchestrator: Arc::new(PromptOrchestrator::new(
                root.join("prompts"),
                PromptRegistry::builtin(),
            )),
            runner: runner.clone(),
            sources,
            credentials,
            logs: Arc::clone(&logs),
        };
        let service = TaskExecutionService::new(store, components.clone())
            .with_prompt_timeout(Duration::from_secs(5));
        Self {
            _dir: dir,
            root,
            runner,
            logs,
            service,
            components,
        }
    }

    /// Builds a second service sharing this harness's collaborators but
    /// storing jobs in `repository`.
    pub(super) fn service_over<R>(&self, repository: Arc<R>) -> TaskExecutionService<R, DefaultClock>
    where
        R: JobRepository + 'static,
    {
        let store = JobStoreService::new(repository, Arc::new(DefaultClock));
        TaskExecutionService::new(store, self.components.clone())
            .with_prompt_timeout(Duration::from_secs(5))
    }

    /// Overwrites a prompt file below `prompts/`.
    pub(super) fn prompt(&self, relative: &str, contents: &str) {
        write(&self.root, &format!("prompts/{relative}"), contents);
    }

    /// Creates the `J1` job with one `code_architect/analyze` task.
    pub(super) async fn create_job(&self, config: TaskConfig) -> (Job, TaskKey) {
        let job = self
            .service
            .store()
            .create_job(
                JobSpec::new("J1", "demo").with_targets(["rust"]).with_stage(
                    StageSpec::new("s1", "S1").with_task(
                        TaskSpec::new("T0", "code_architect", "analyze").with_config(config),
                    ),
                ),
            )
            .await
            .expect("job created");
        let key = job.task_key(
            &StageId::new("s1").expect("valid stage id"),
            TaskIndex::new(0),
        );
        (job, key)
    }

    pub(super) fn log_text(&self, key: &TaskKey) -> Vec<String> {
        self.logs
            .logs(key)
            .into_iter()
            .map(|entry| entry.message)
            .collect()
    }
}

fn write(root: &Utf8Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent");
    }
    std::fs::write(path, contents).expect("write file");
}
