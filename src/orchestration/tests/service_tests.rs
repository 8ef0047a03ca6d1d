//! Tests for executing tasks end to end against scripted collaborators.

use super::Harness;
use crate::job::adapters::memory::InMemoryJobRepository;
use crate::job::domain::{
    ExecutionStatus, FailureKind, Job, JobId, JobSpec, PromptOrigin, PromptStatus, StageId,
    StageSpec, Task, TaskConfig, TaskIndex, TaskSpec, TaskStatus,
};
use crate::job::ports::{JobRepository, JobRepositoryResult};
use crate::orchestration::ports::{
    CredentialError, MockCredentialProvider, MockSourceProvider, Secret, SourceError,
};
use crate::orchestration::{ExecutionError, ExecutionReport};
use crate::workspace::{ExecutionManifest, MANIFEST_FILE};
use async_trait::async_trait;
use eyre::{OptionExt, ensure};
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// In-memory repository whose `delete` pauses until the test opens its gate.
struct GatedRepository {
    inner: InMemoryJobRepository,
    entered: Semaphore,
    gate: Semaphore,
}

impl GatedRepository {
    fn new() -> Self {
        Self {
            inner: InMemoryJobRepository::new(),
            entered: Semaphore::new(0),
            gate: Semaphore::new(0),
        }
    }
}

#[async_trait]
impl JobRepository for GatedRepository {
    async fn store(&self, job: &Job) -> JobRepositoryResult<()> {
        self.inner.store(job).await
    }

    async fn find_by_id(&self, id: JobId) -> JobRepositoryResult<Option<Job>> {
        self.inner.find_by_id(id).await
    }

    async fn list(&self) -> JobRepositoryResult<Vec<Job>> {
        self.inner.list().await
    }

    async fn update_task(
        &self,
        job_id: JobId,
        stage_id: &StageId,
        task: &Task,
    ) -> JobRepositoryResult<Job> {
        self.inner.update_task(job_id, stage_id, task).await
    }

    async fn delete(&self, id: JobId) -> JobRepositoryResult<()> {
        self.entered.add_permits(1);
        self.gate.acquire().await.expect("gate open").forget();
        self.inner.delete(id).await
    }
}

async fn wait_until_idle(harness: &Harness, key: &crate::job::domain::TaskKey) {
    for _ in 0..500 {
        if !harness.service.is_running(key) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("execution of {key} never finished");
}

async fn wait_until_running(harness: &Harness, key: &crate::job::domain::TaskKey) {
    for _ in 0..200 {
        if !harness.runner.calls().is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(harness.service.is_running(key), "execution never started");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn analyze_task_runs_agent_then_target_prompt() -> eyre::Result<()> {
    let harness = Harness::new();
    let (_, key) = harness.create_job(TaskConfig::new()).await;

    let report = harness.service.execute(&key).await?;

    ensure!(report.status == ExecutionStatus::Completed);
    let files: Vec<&str> = report
        .prompt_results
        .iter()
        .map(|result| result.prompt_file.as_str())
        .collect();
    ensure!(files == ["01_analyze_codebase.md", "targets/rust/01_analyze.md"]);
    ensure!(report.prompt_results[1].origin == PromptOrigin::Target);

    let task = harness.service.store().get_task(&key).await?;
    ensure!(task.status() == TaskStatus::Completed);
    ensure!(task.executions().len() == 1);

    let output_dir = report.output_dir.clone().ok_or_eyre("outputs persisted")?;
    let manifest: ExecutionManifest =
        serde_json::from_str(&std::fs::read_to_string(output_dir.join(MANIFEST_FILE))?)?;
    let manifest_files: Vec<&str> = manifest
        .prompts
        .iter()
        .map(|prompt| prompt.prompt_file.as_str())
        .collect();
    ensure!(manifest_files == files);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn prompts_are_rendered_and_run_inside_input_snapshot() -> eyre::Result<()> {
    let harness = Harness::new();
    let (_, key) = harness.create_job(TaskConfig::new()).await;

    harness.service.execute(&key).await?;

    let calls = harness.runner.calls();
    ensure!(calls.len() == 2);
    let first = calls.first().ok_or_eyre("first call")?;
    ensure!(first.working_dir.ends_with("input"));
    ensure!(first.working_dir.join("main.py").is_file());
    ensure!(first.rendered.starts_with("Analyse J1 from demo in "));
    ensure!(first.rendered.contains(first.working_dir.as_str()));
    let second = calls.get(1).ok_or_eyre("second call")?;
    ensure!(second.rendered == "Map patterns to rust");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn soft_failure_continues_but_fails_the_task() -> eyre::Result<()> {
    let harness = Harness::new();
    harness.prompt(
        "code_architect/analyze/01_analyze_codebase.md",
        "SOFT_FAIL {{job_name}}",
    );
    let (_, key) = harness.create_job(TaskConfig::new()).await;

    let report = harness.service.execute(&key).await?;

    ensure!(report.status == ExecutionStatus::Failed);
    ensure!(report.prompt_results.len() == 2);
    ensure!(report.prompt_results[0].failure_kind == Some(FailureKind::ToolReported));
    ensure!(report.prompt_results[1].status == PromptStatus::Success);
    ensure!(report.failure.is_none());
    let task = harness.service.store().get_task(&key).await?;
    ensure!(task.status() == TaskStatus::Failed);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn hard_failure_stops_the_sequence() -> eyre::Result<()> {
    let harness = Harness::new();
    harness.prompt(
        "code_architect/analyze/01_analyze_codebase.md",
        "HARD_FAIL",
    );
    let (_, key) = harness.create_job(TaskConfig::new()).await;

    let report = harness.service.execute(&key).await?;

    ensure!(report.status == ExecutionStatus::Failed);
    ensure!(report.prompt_results.len() == 1);
    ensure!(harness.runner.calls().len() == 1);
    ensure!(
        harness
            .log_text(&key)
            .iter()
            .any(|line| line.contains("stopping prompt sequence"))
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_prompt_file_fails_before_running_anything() -> eyre::Result<()> {
    let harness = Harness::new();
    std::fs::remove_file(harness.root.join("prompts/targets/rust/01_analyze.md"))?;
    let (_, key) = harness.create_job(TaskConfig::new()).await;

    let report = harness.service.execute(&key).await?;

    ensure!(report.status == ExecutionStatus::Failed);
    let failure = report.failure.clone().ok_or_eyre("execution failure")?;
    ensure!(failure.kind == FailureKind::Configuration);
    ensure!(failure.message.contains("targets/rust/01_analyze.md"));
    ensure!(harness.runner.calls().is_empty());
    let task = harness.service.store().get_task(&key).await?;
    ensure!(task.status() == TaskStatus::Failed);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unregistered_capability_is_a_configuration_failure() -> eyre::Result<()> {
    let harness = Harness::new();
    let job = harness
        .service
        .store()
        .create_job(
            crate::job::domain::JobSpec::new("J2", "demo").with_stage(
                crate::job::domain::StageSpec::new("s1", "S1").with_task(
                    crate::job::domain::TaskSpec::new("T0", "code_architect", "dance"),
                ),
            ),
        )
        .await?;
    let key = job.task_key(
        &crate::job::domain::StageId::new("s1")?,
        crate::job::domain::TaskIndex::new(0),
    );

    let report = harness.service.execute(&key).await?;

    let failure = report.failure.ok_or_eyre("execution failure")?;
    ensure!(failure.kind == FailureKind::Configuration);
    ensure!(failure.message.contains("no prompts found for code_architect/dance"));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unreadable_source_is_a_filesystem_failure() -> eyre::Result<()> {
    let mut sources = MockSourceProvider::new();
    sources
        .expect_read_source_snapshot()
        .returning(|source_ref| Err(SourceError::NotFound(source_ref.to_string())));
    let harness = Harness::with_collaborators(Some(Arc::new(sources)), None);
    let (_, key) = harness.create_job(TaskConfig::new()).await;

    let report = harness.service.execute(&key).await?;

    let failure = report.failure.ok_or_eyre("execution failure")?;
    ensure!(failure.kind == FailureKind::Filesystem);
    ensure!(failure.message.contains("source not found: demo"));
    ensure!(harness.runner.calls().is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn credential_is_rendered_but_never_logged() -> eyre::Result<()> {
    let mut credentials = MockCredentialProvider::new();
    credentials
        .expect_resolve()
        .withf(|credential_id| credential_id.to_string() == "cred-1")
        .times(1)
        .returning(|_| Ok(Secret::new("s3cr3t-token")));
    let harness = Harness::with_collaborators(None, Some(Arc::new(credentials)));
    harness.prompt(
        "code_architect/analyze/01_analyze_codebase.md",
        "Use token {{credential}}",
    );
    let (_, key) = harness
        .create_job(TaskConfig::new().with("credential_id", "cred-1"))
        .await;

    let report = harness.service.execute(&key).await?;

    ensure!(report.is_success());
    let calls = harness.runner.calls();
    ensure!(calls.first().is_some_and(|call| call.rendered == "Use token s3cr3t-token"));
    ensure!(
        !harness
            .log_text(&key)
            .iter()
            .any(|line| line.contains("s3cr3t-token"))
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_credential_is_a_configuration_failure() -> eyre::Result<()> {
    let mut credentials = MockCredentialProvider::new();
    credentials
        .expect_resolve()
        .returning(|credential_id| Err(CredentialError::NotFound(credential_id.to_string())));
    let harness = Harness::with_collaborators(None, Some(Arc::new(credentials)));
    let (_, key) = harness
        .create_job(TaskConfig::new().with("credential_id", "missing"))
        .await;

    let report = harness.service.execute(&key).await?;

    let failure = report.failure.ok_or_eyre("execution failure")?;
    ensure!(failure.kind == FailureKind::Configuration);
    ensure!(harness.runner.calls().is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unresolved_placeholders_are_kept_and_warned_about() -> eyre::Result<()> {
    let harness = Harness::new();
    harness.prompt(
        "code_architect/analyze/01_analyze_codebase.md",
        "Hello {{missing}}",
    );
    let (_, key) = harness.create_job(TaskConfig::new()).await;

    harness.service.execute(&key).await?;

    let calls = harness.runner.calls();
    ensure!(calls.first().is_some_and(|call| call.rendered == "Hello {{missing}}"));
    ensure!(
        harness
            .log_text(&key)
            .iter()
            .any(|line| line.contains("unresolved placeholder {{missing}}"))
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_execution_of_a_running_task_is_refused() -> eyre::Result<()> {
    let harness = Harness::new();
    harness.prompt("code_architect/analyze/01_analyze_codebase.md", "BLOCK");
    let (_, key) = harness.create_job(TaskConfig::new()).await;

    let handle = harness.service.start_execution(&key)?;
    wait_until_running(&harness, &key).await;

    ensure!(harness.service.is_running(&key));
    let second = harness.service.execute(&key).await;
    ensure!(matches!(second, Err(ExecutionError::ConcurrentExecution(ref refused)) if *refused == key));
    let task = harness.service.store().get_task(&key).await?;
    ensure!(task.status() == TaskStatus::Running);

    harness.runner.release();
    let report = handle.await??;
    ensure!(report.is_success());
    ensure!(!harness.service.is_running(&key));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_starts_admit_exactly_one_execution() -> eyre::Result<()> {
    let harness = Harness::new();
    harness.prompt("code_architect/analyze/01_analyze_codebase.md", "BLOCK");
    let (_, key) = harness.create_job(TaskConfig::new()).await;

    let attempts: Vec<_> = (0..16)
        .map(|_| harness.service.start_execution(&key))
        .collect();
    let (started, refused): (Vec<_>, Vec<_>) = attempts.into_iter().partition(Result::is_ok);

    ensure!(started.len() == 1);
    ensure!(refused.len() == 15);
    ensure!(refused.iter().all(|attempt| matches!(
        attempt,
        Err(ExecutionError::ConcurrentExecution(_))
    )));

    harness.runner.release();
    for attempt in started {
        let report: ExecutionReport = attempt?.await??;
        ensure!(report.is_success());
    }
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn different_tasks_execute_concurrently() -> eyre::Result<()> {
    let harness = Harness::new();
    harness.prompt("code_architect/analyze/01_analyze_codebase.md", "BLOCK");
    let (_, first) = harness.create_job(TaskConfig::new()).await;
    let (_, second) = harness.create_job(TaskConfig::new()).await;

    let first_handle = harness.service.start_execution(&first)?;
    let second_handle = harness.service.start_execution(&second)?;
    ensure!(harness.service.is_running(&first));
    ensure!(harness.service.is_running(&second));

    harness.runner.release();
    harness.runner.release();
    ensure!(first_handle.await??.is_success());
    ensure!(second_handle.await??.is_success());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn panicking_execution_releases_lock_and_fails_task() -> eyre::Result<()> {
    let harness = Harness::new();
    harness.prompt("code_architect/analyze/01_analyze_codebase.md", "PANIC");
    let (_, key) = harness.create_job(TaskConfig::new()).await;

    let report = harness.service.execute(&key).await?;

    ensure!(report.status == ExecutionStatus::Failed);
    let failure = report.failure.ok_or_eyre("execution failure")?;
    ensure!(failure.message.contains("crashed"));
    ensure!(!harness.service.is_running(&key));
    let task = harness.service.store().get_task(&key).await?;
    ensure!(task.status() == TaskStatus::Failed);

    harness.prompt("code_architect/analyze/01_analyze_codebase.md", "recovered");
    let rerun = harness.service.execute(&key).await?;
    ensure!(rerun.is_success());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rerun_keeps_earlier_outputs() -> eyre::Result<()> {
    let harness = Harness::new();
    let (_, key) = harness.create_job(TaskConfig::new()).await;

    let first = harness.service.execute(&key).await?;
    let second = harness.service.execute(&key).await?;

    ensure!(first.execution_id != second.execution_id);
    let first_dir = first.output_dir.ok_or_eyre("first outputs")?;
    ensure!(first_dir.join(MANIFEST_FILE).is_file());
    let task = harness.service.store().get_task(&key).await?;
    ensure!(task.executions().len() == 2);
    ensure!(task.status() == TaskStatus::Completed);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn logs_trace_the_execution_and_support_polling() -> eyre::Result<()> {
    let harness = Harness::new();
    let (_, key) = harness.create_job(TaskConfig::new()).await;

    let report = harness.service.execute(&key).await?;

    let entries = harness.service.get_logs(&key);
    ensure!(entries.iter().all(|entry| entry.execution_id == Some(report.execution_id)));
    let messages: Vec<&str> = entries.iter().map(|entry| entry.message.as_str()).collect();
    ensure!(messages.first().is_some_and(|line| line.contains("started: code_architect/analyze")));
    ensure!(messages.iter().any(|line| line.contains("scripted tool output")));
    ensure!(messages.last().is_some_and(|line| line.contains("2/2 prompts succeeded")));

    let midpoint = entries.get(2).ok_or_eyre("enough entries")?.sequence;
    let newer = harness.service.get_logs_since(&key, midpoint);
    ensure!(newer.len() == entries.len() - 3);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn list_files_shows_snapshot_and_outputs() -> eyre::Result<()> {
    let harness = Harness::new();
    let (_, key) = harness.create_job(TaskConfig::new()).await;
    harness.service.execute(&key).await?;

    let tree = harness.service.list_files(&key).await?;

    let json = serde_json::to_value(&tree)?;
    let input = json["input"].to_string();
    ensure!(input.contains("main.py"));
    let output = json["output"].to_string();
    ensure!(output.contains("latest.json"));
    ensure!(output.contains(MANIFEST_FILE));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delete_job_is_refused_while_running() -> eyre::Result<()> {
    let harness = Harness::new();
    harness.prompt("code_architect/analyze/01_analyze_codebase.md", "BLOCK");
    let (job, key) = harness.create_job(TaskConfig::new()).await;

    let handle = harness.service.start_execution(&key)?;
    let refused = harness.service.delete_job(job.id()).await;
    ensure!(matches!(refused, Err(ExecutionError::JobBusy(id)) if id == job.id()));

    harness.runner.release();
    handle.await??;
    harness.service.delete_job(job.id()).await?;
    ensure!(harness.service.get_logs(&key).is_empty());
    ensure!(!harness.root.join("data/jobs").join(job.id().to_string()).exists());
    ensure!(!harness.service.is_running(&key));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn abandoned_execute_keeps_the_task_locked_until_recorded() -> eyre::Result<()> {
    let harness = Harness::new();
    harness.prompt("code_architect/analyze/01_analyze_codebase.md", "BLOCK");
    let (_, key) = harness.create_job(TaskConfig::new()).await;

    let abandoned =
        tokio::time::timeout(Duration::from_millis(300), harness.service.execute(&key)).await;
    ensure!(abandoned.is_err(), "blocked execution finished early");
    wait_until_running(&harness, &key).await;

    ensure!(harness.service.is_running(&key));
    let second = harness.service.start_execution(&key);
    ensure!(matches!(second, Err(ExecutionError::ConcurrentExecution(_))));
    ensure!(harness.runner.calls().len() == 1);

    harness.runner.release();
    wait_until_idle(&harness, &key).await;
    let task = harness.service.store().get_task(&key).await?;
    ensure!(task.status() == TaskStatus::Completed);
    ensure!(task.executions().len() == 1);
    ensure!(harness.runner.calls().len() == 2);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn execution_cannot_start_while_its_job_is_being_deleted() -> eyre::Result<()> {
    let harness = Harness::new();
    let repository = Arc::new(GatedRepository::new());
    let service = harness.service_over(Arc::clone(&repository));
    let job = service
        .store()
        .create_job(
            JobSpec::new("J1", "demo").with_targets(["rust"]).with_stage(
                StageSpec::new("s1", "S1")
                    .with_task(TaskSpec::new("T0", "code_architect", "analyze")),
            ),
        )
        .await?;
    let key = job.task_key(&StageId::new("s1")?, TaskIndex::new(0));
    let job_id = job.id();

    let deleter = service.clone();
    let deleting = tokio::spawn(async move { deleter.delete_job(job_id).await });
    repository.entered.acquire().await?.forget();

    ensure!(service.is_running(&key), "deletion must hold the task lock");
    let refused = service.execute(&key).await;
    ensure!(matches!(refused, Err(ExecutionError::ConcurrentExecution(_))));

    repository.gate.add_permits(1);
    deleting.await??;
    ensure!(!service.is_running(&key));
    ensure!(harness.runner.calls().is_empty());
    ensure!(service.store().get_job(job_id).await.is_err());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn refused_deletion_releases_the_locks_it_took() -> eyre::Result<()> {
    let harness = Harness::new();
    harness.prompt("code_architect/analyze/01_analyze_codebase.md", "BLOCK");
    let job = harness
        .service
        .store()
        .create_job(
            JobSpec::new("J1", "demo").with_targets(["rust"]).with_stage(
                StageSpec::new("s1", "S1")
                    .with_task(TaskSpec::new("T0", "code_architect", "plan"))
                    .with_task(TaskSpec::new("T1", "code_architect", "analyze")),
            ),
        )
        .await?;
    let stage = StageId::new("s1")?;
    let idle = job.task_key(&stage, TaskIndex::new(0));
    let busy = job.task_key(&stage, TaskIndex::new(1));

    let handle = harness.service.start_execution(&busy)?;
    let refused = harness.service.delete_job(job.id()).await;

    ensure!(matches!(refused, Err(ExecutionError::JobBusy(_))));
    ensure!(!harness.service.is_running(&idle));
    ensure!(harness.service.store().get_job(job.id()).await.is_ok());

    harness.runner.release();
    handle.await??;
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn executing_an_unknown_job_is_an_error() {
    let harness = Harness::new();
    let key = crate::job::domain::TaskKey::new(
        JobId::new(),
        crate::job::domain::StageId::new("s1").expect("valid stage id"),
        crate::job::domain::TaskIndex::new(0),
    );

    let result = harness.service.execute(&key).await;

    assert!(matches!(result, Err(ExecutionError::Store(_))));
    assert!(!harness.service.is_running(&key));
}
