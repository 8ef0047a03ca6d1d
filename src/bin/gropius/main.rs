//! Command-line front end for the task execution orchestrator.
//!
//! Usage:
//!
//! ```text
//! gropius create-job --name payments --source legacy-payments --target rust
//! gropius execute <job-id> code_analysis 0
//! gropius sequence code_architect analyze --target rust
//! gropius files <job-id> code_analysis 0
//! ```
//!
//! Jobs persist under the data directory between invocations. Execution logs
//! stream to stderr while a task runs and the final report is printed to
//! stdout as JSON.

mod cli;

use clap::Parser;
use cli::{Cli, Command, config_patch};
use gropius::config::OrchestratorConfig;
use gropius::job::adapters::json_file::JsonFileJobRepository;
use gropius::job::domain::{AgentName, CapabilityName, JobSpec, TargetName, TaskKey};
use gropius::job::services::JobStoreService;
use gropius::orchestration::adapters::InMemoryCredentialProvider;
use gropius::orchestration::ports::Secret;
use gropius::orchestration::{ExecutionComponents, ExecutionReport, TaskExecutionService};
use gropius::prompt::PromptOrchestrator;
use mockable::DefaultClock;
use serde::Serialize;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

type Service = TaskExecutionService<JsonFileJobRepository, DefaultClock>;

const LOG_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = cli.settings()?;
    run(cli.command, &config).await
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "gropius=debug" } else { "gropius=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(command: Command, config: &OrchestratorConfig) -> eyre::Result<ExitCode> {
    match command {
        Command::CreateJob {
            name,
            source,
            targets,
            target_ref,
            description,
        } => {
            let spec = JobSpec::new(name, source)
                .with_targets(targets)
                .with_target_ref(target_ref)
                .with_description(description);
            let job = build_service(config, InMemoryCredentialProvider::new())?
                .store()
                .create_job(spec)
                .await?;
            print_json(&job)?;
        }
        Command::ListJobs => {
            let jobs = build_service(config, InMemoryCredentialProvider::new())?
                .store()
                .list_jobs()
                .await?;
            let mut out = std::io::stdout().lock();
            for job in jobs {
                writeln!(
                    out,
                    "{}  {:<9} {:>3}%  {}",
                    job.id(),
                    job.status().as_str(),
                    job.progress(),
                    job.name()
                )?;
            }
        }
        Command::ShowJob { job_id } => {
            let job = build_service(config, InMemoryCredentialProvider::new())?
                .store()
                .get_job(job_id)
                .await?;
            print_json(&job)?;
        }
        Command::DeleteJob { job_id } => {
            build_service(config, InMemoryCredentialProvider::new())?
                .delete_job(job_id)
                .await?;
        }
        Command::Configure { task, set, unset } => {
            let task = build_service(config, InMemoryCredentialProvider::new())?
                .store()
                .update_task_config(&task.key()?, config_patch(set, unset))
                .await?;
            print_json(&task)?;
        }
        Command::Catalog => {
            let orchestrator = PromptOrchestrator::load(config.prompts_dir.clone())?;
            print_json(&orchestrator.orchestration_info())?;
        }
        Command::Sequence {
            agent,
            capability,
            targets,
        } => {
            let orchestrator = PromptOrchestrator::load(config.prompts_dir.clone())?;
            let sequence = orchestrator.resolve_sequence(
                &AgentName::new(agent)?,
                &CapabilityName::new(capability)?,
                &target_names(&targets)?,
            )?;
            print_json(&sequence)?;
        }
        Command::Validate {
            agent,
            capability,
            targets,
        } => {
            let orchestrator = PromptOrchestrator::load(config.prompts_dir.clone())?;
            let report = orchestrator.validate_orchestration(
                &AgentName::new(agent)?,
                &CapabilityName::new(capability)?,
                &target_names(&targets)?,
            )?;
            print_json(&report)?;
            if !report.valid {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Execute { task, credentials } => {
            let provider = InMemoryCredentialProvider::new();
            for (id, variable) in credentials {
                let value = std::env::var(&variable)
                    .map_err(|err| eyre::eyre!("credential {id}: {variable}: {err}"))?;
                provider.insert(id, Secret::new(value))?;
            }
            let service = build_service(config, provider)?;
            let report = execute_streaming(&service, &task.key()?).await?;
            print_json(&report)?;
            if !report.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Files { task } => {
            let tree = build_service(config, InMemoryCredentialProvider::new())?
                .list_files(&task.key()?)
                .await?;
            print_json(&tree)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn target_names(raw: &[String]) -> eyre::Result<Vec<TargetName>> {
    Ok(raw
        .iter()
        .map(TargetName::new)
        .collect::<Result<Vec<_>, _>>()?)
}

fn build_service(
    config: &OrchestratorConfig,
    credentials: InMemoryCredentialProvider,
) -> eyre::Result<Service> {
    let clock = Arc::new(DefaultClock);
    let store = JobStoreService::new(
        Arc::new(JsonFileJobRepository::new(config.data_dir.clone())),
        Arc::clone(&clock),
    );
    let components = ExecutionComponents::from_config(config, Arc::new(credentials), clock)?;
    Ok(TaskExecutionService::new(store, components).with_prompt_timeout(config.prompt_timeout()))
}

async fn execute_streaming(service: &Service, key: &TaskKey) -> eyre::Result<ExecutionReport> {
    let handle = service.start_execution(key)?;
    let mut cursor = 0;
    while !handle.is_finished() {
        tokio::time::sleep(LOG_POLL_INTERVAL).await;
        cursor = drain_logs(service, key, cursor)?;
    }
    let report = handle.await??;
    drain_logs(service, key, cursor)?;
    Ok(report)
}

fn drain_logs(service: &Service, key: &TaskKey, after: u64) -> eyre::Result<u64> {
    let mut err = std::io::stderr().lock();
    let mut cursor = after;
    for entry in service.get_logs_since(key, after) {
        writeln!(err, "{entry}")?;
        cursor = entry.sequence;
    }
    Ok(cursor)
}

fn print_json(value: &impl Serialize) -> eyre::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
