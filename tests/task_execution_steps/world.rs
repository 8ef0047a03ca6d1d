//! Shared world state for task execution BDD scenarios.

use crate::test_helpers::workbench::{FileService, Workbench};
use gropius::job::domain::{JobSpec, StageId, StageSpec, TaskIndex, TaskKey, TaskSpec};
use gropius::orchestration::ExecutionReport;
use rstest::fixture;

/// Task placement declared by the scenario background.
pub struct PlannedTask {
    pub stage_id: String,
    pub name: String,
    pub agent: String,
    pub capability: String,
}

/// Scenario world for task execution behaviour tests.
///
/// The service and job are created on first use so that `Given` steps can
/// still adjust prompts and settings.
pub struct ExecutionWorld {
    pub bench: Workbench,
    pub job: Option<JobSpec>,
    pub task: Option<PlannedTask>,
    pub last_report: Option<ExecutionReport>,
    service: Option<FileService>,
    key: Option<TaskKey>,
}

impl ExecutionWorld {
    /// Creates a world over a fresh workbench.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bench: Workbench::new().expect("workbench"),
            job: None,
            task: None,
            last_report: None,
            service: None,
            key: None,
        }
    }

    /// Returns the service, building it on first use.
    pub fn service(&mut self) -> Result<&FileService, eyre::Report> {
        if self.service.is_none() {
            self.service = Some(self.bench.service()?);
        }
        self.service
            .as_ref()
            .ok_or_else(|| eyre::eyre!("service not initialised"))
    }

    /// Returns the task key, creating the job on first use.
    pub fn task_key(&mut self) -> Result<TaskKey, eyre::Report> {
        if let Some(key) = &self.key {
            return Ok(key.clone());
        }
        let planned = self
            .task
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing task in scenario world"))?;
        let stage_id = StageId::new(&planned.stage_id)?;
        let spec = self
            .job
            .clone()
            .ok_or_else(|| eyre::eyre!("missing job in scenario world"))?
            .with_stage(StageSpec::new(&planned.stage_id, "Scenario stage").with_task(
                TaskSpec::new(&planned.name, &planned.agent, &planned.capability),
            ));
        let job = run_async(self.service()?.store().create_job(spec))?;
        let key = job.task_key(&stage_id, TaskIndex::new(0));
        self.key = Some(key.clone());
        Ok(key)
    }

    /// Returns the report of the latest execution.
    pub fn report(&self) -> Result<&ExecutionReport, eyre::Report> {
        self.last_report
            .as_ref()
            .ok_or_else(|| eyre::eyre!("no execution report in scenario world"))
    }

    /// Returns the service once it exists.
    pub fn existing_service(&self) -> Result<&FileService, eyre::Report> {
        self.service
            .as_ref()
            .ok_or_else(|| eyre::eyre!("service not initialised"))
    }

    /// Returns the task key once the job exists.
    pub fn existing_key(&self) -> Result<&TaskKey, eyre::Report> {
        self.key
            .as_ref()
            .ok_or_else(|| eyre::eyre!("job not created"))
    }
}

impl Default for ExecutionWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> ExecutionWorld {
    ExecutionWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
