//! Job aggregate root and stages.

use super::{
    ConfigPatch, Execution, JobDomainError, JobId, ParseStatusError, StageId, TargetName, Task,
    TaskIndex, TaskKey, TaskSpec, TaskStatus, default_workflow,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Derived stage status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// No task has started.
    Pending,
    /// At least one task has started but not all completed.
    InProgress,
    /// Every task completed.
    Completed,
}

impl StageStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    fn derive(tasks: &[Task]) -> Self {
        if !tasks.is_empty() && tasks.iter().all(|t| t.status() == TaskStatus::Completed) {
            Self::Completed
        } else if tasks.iter().any(|t| t.status() != TaskStatus::Pending) {
            Self::InProgress
        } else {
            Self::Pending
        }
    }
}

/// Derived overall job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// No task has started.
    Pending,
    /// Work has started on at least one stage.
    InProgress,
    /// Every stage completed.
    Completed,
}

impl JobStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl TryFrom<&str> for JobStatus {
    type Error = ParseStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            _ => Err(ParseStatusError(value.to_owned())),
        }
    }
}

/// Creation-time description of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    /// Stage identifier, unique within the job.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Display names of the agents working in this stage.
    pub agents: Vec<String>,
    /// Ordered tasks; positions become task indices.
    pub tasks: Vec<TaskSpec>,
}

impl StageSpec {
    /// Creates a stage spec without tasks.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            agents: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the agent display names.
    #[must_use]
    pub fn with_agents(mut self, agents: impl IntoIterator<Item = String>) -> Self {
        self.agents = agents.into_iter().collect();
        self
    }

    /// Appends a task.
    #[must_use]
    pub fn with_task(mut self, task: TaskSpec) -> Self {
        self.tasks.push(task);
        self
    }
}

/// An ordered phase of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    id: StageId,
    name: String,
    description: String,
    agents: Vec<String>,
    status: StageStatus,
    tasks: Vec<Task>,
}

impl Stage {
    fn from_spec(spec: StageSpec, clock: &impl Clock) -> Result<Self, JobDomainError> {
        let id = StageId::new(spec.id)?;
        if spec.tasks.is_empty() {
            return Err(JobDomainError::EmptyStage(id.to_string()));
        }
        let tasks = spec
            .tasks
            .into_iter()
            .zip(0_u32..)
            .map(|(task, position)| Task::from_spec(TaskIndex::new(position), task, clock))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id,
            name: spec.name.trim().to_owned(),
            description: spec.description,
            agents: spec.agents,
            status: StageStatus::Pending,
            tasks,
        })
    }

    /// Returns the stage identifier.
    #[must_use]
    pub const fn id(&self) -> &StageId {
        &self.id
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the display names of the assigned agents.
    #[must_use]
    pub fn agents(&self) -> &[String] {
        &self.agents
    }

    /// Returns the derived stage status.
    #[must_use]
    pub const fn status(&self) -> StageStatus {
        self.status
    }

    /// Returns the tasks in index order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Finds a task by index.
    #[must_use]
    pub fn task(&self, index: TaskIndex) -> Option<&Task> {
        self.tasks.iter().find(|task| task.index() == index)
    }

    fn task_mut(&mut self, index: TaskIndex) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.index() == index)
    }
}

/// Creation-time description of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Job name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Reference understood by the source provider.
    pub source_ref: String,
    /// Reference to the target platform record.
    pub target_ref: String,
    /// Target frameworks selected for the job.
    pub targets: Vec<String>,
    /// Ordered stages; empty selects the default migration workflow.
    pub stages: Vec<StageSpec>,
}

impl JobSpec {
    /// Creates a job spec that uses the default migration workflow.
    #[must_use]
    pub fn new(name: impl Into<String>, source_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            source_ref: source_ref.into(),
            target_ref: String::new(),
            targets: Vec::new(),
            stages: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the target platform reference.
    #[must_use]
    pub fn with_target_ref(mut self, target_ref: impl Into<String>) -> Self {
        self.target_ref = target_ref.into();
        self
    }

    /// Sets the target frameworks.
    #[must_use]
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Appends an explicit stage.
    #[must_use]
    pub fn with_stage(mut self, stage: StageSpec) -> Self {
        self.stages.push(stage);
        self
    }
}

/// Top-level migration unit pairing a source with a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    name: String,
    description: String,
    source_ref: String,
    target_ref: String,
    targets: Vec<TargetName>,
    stages: Vec<Stage>,
    status: JobStatus,
    progress: u8,
    current_stage: usize,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Job {
    /// Creates a job from its spec.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError`] when a required field is empty, a name is
    /// invalid, a stage has no tasks or two stages share an identifier.
    pub fn create(spec: JobSpec, clock: &impl Clock) -> Result<Self, JobDomainError> {
        let name = spec.name.trim().to_owned();
        if name.is_empty() {
            return Err(JobDomainError::EmptyJobName);
        }
        let source_ref = spec.source_ref.trim().to_owned();
        if source_ref.is_empty() {
            return Err(JobDomainError::EmptySourceRef);
        }
        let targets = spec
            .targets
            .iter()
            .map(TargetName::new)
            .collect::<Result<Vec<_>, _>>()?;

        let stage_specs = if spec.stages.is_empty() {
            default_workflow()
        } else {
            spec.stages
        };

        let mut seen = HashSet::new();
        let mut stages = Vec::with_capacity(stage_specs.len());
        for stage_spec in stage_specs {
            let stage = Stage::from_spec(stage_spec, clock)?;
            if !seen.insert(stage.id.clone()) {
                return Err(JobDomainError::DuplicateStage(stage.id.to_string()));
            }
            stages.push(stage);
        }

        let timestamp = clock.utc();
        let mut job = Self {
            id: JobId::new(),
            name,
            description: spec.description,
            source_ref,
            target_ref: spec.target_ref.trim().to_owned(),
            targets,
            stages,
            status: JobStatus::Pending,
            progress: 0,
            current_stage: 0,
            created_at: timestamp,
            updated_at: timestamp,
        };
        job.refresh_derived();
        Ok(job)
    }

    /// Returns the job identifier.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Returns the job name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the job description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the source reference.
    #[must_use]
    pub fn source_ref(&self) -> &str {
        &self.source_ref
    }

    /// Returns the target reference.
    #[must_use]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    /// Returns the target frameworks selected for the job.
    #[must_use]
    pub fn targets(&self) -> &[TargetName] {
        &self.targets
    }

    /// Returns the stages in order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Returns the derived job status.
    #[must_use]
    pub const fn status(&self) -> JobStatus {
        self.status
    }

    /// Returns the completion percentage (completed stages / stages).
    #[must_use]
    pub const fn progress(&self) -> u8 {
        self.progress
    }

    /// Returns the position of the first stage that is not completed.
    #[must_use]
    pub const fn current_stage(&self) -> usize {
        self.current_stage
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Finds a stage by identifier.
    #[must_use]
    pub fn stage(&self, stage_id: &StageId) -> Option<&Stage> {
        self.stages.iter().find(|stage| &stage.id == stage_id)
    }

    /// Builds the key for a task in this job.
    #[must_use]
    pub fn task_key(&self, stage_id: &StageId, index: TaskIndex) -> TaskKey {
        TaskKey::new(self.id, stage_id.clone(), index)
    }

    /// Keys of every task in the job, stage by stage.
    pub fn task_keys(&self) -> impl Iterator<Item = TaskKey> + '_ {
        self.stages.iter().flat_map(move |stage| {
            stage
                .tasks
                .iter()
                .map(move |task| self.task_key(&stage.id, task.index()))
        })
    }

    /// Finds a task by stage and index.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::StageNotFound`] or
    /// [`JobDomainError::TaskNotFound`].
    pub fn task(&self, stage_id: &StageId, index: TaskIndex) -> Result<&Task, JobDomainError> {
        let stage = self.stage(stage_id).ok_or_else(|| self.stage_not_found(stage_id))?;
        stage
            .task(index)
            .ok_or_else(|| JobDomainError::TaskNotFound(self.task_key(stage_id, index)))
    }

    /// Targets for a task: the task's `targets` override, else the job's.
    ///
    /// # Errors
    ///
    /// Propagates lookup errors and invalid target overrides.
    pub fn effective_targets(
        &self,
        stage_id: &StageId,
        index: TaskIndex,
    ) -> Result<Vec<TargetName>, JobDomainError> {
        let task = self.task(stage_id, index)?;
        Ok(task
            .config()
            .targets()?
            .unwrap_or_else(|| self.targets.clone()))
    }

    /// Replaces a task with an updated copy and recomputes derived fields.
    ///
    /// The task index is taken from `task`; positions never change. The job's
    /// `updated_at` advances to the task's timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::StageNotFound`] or
    /// [`JobDomainError::TaskNotFound`].
    pub fn replace_task(&mut self, stage_id: &StageId, task: Task) -> Result<(), JobDomainError> {
        let key = self.task_key(stage_id, task.index());
        let stage_not_found = self.stage_not_found(stage_id);
        let stage = self
            .stages
            .iter_mut()
            .find(|stage| &stage.id == stage_id)
            .ok_or(stage_not_found)?;
        let slot = stage
            .task_mut(task.index())
            .ok_or(JobDomainError::TaskNotFound(key))?;
        let touched = task.updated_at();
        *slot = task;
        self.updated_at = self.updated_at.max(touched);
        self.refresh_derived();
        Ok(())
    }

    /// Applies a configuration patch to a task.
    ///
    /// # Errors
    ///
    /// Returns lookup errors when the task does not exist.
    pub fn patch_task_config(
        &mut self,
        stage_id: &StageId,
        index: TaskIndex,
        patch: ConfigPatch,
        clock: &impl Clock,
    ) -> Result<Task, JobDomainError> {
        let mut task = self.task(stage_id, index)?.clone();
        task.patch_config(patch, clock);
        self.replace_task(stage_id, task.clone())?;
        Ok(task)
    }

    /// Moves a task through the status state machine.
    ///
    /// # Errors
    ///
    /// Returns lookup errors or
    /// [`JobDomainError::InvalidStatusTransition`].
    pub fn transition_task(
        &mut self,
        stage_id: &StageId,
        index: TaskIndex,
        status: TaskStatus,
        clock: &impl Clock,
    ) -> Result<Task, JobDomainError> {
        let key = self.task_key(stage_id, index);
        let mut task = self.task(stage_id, index)?.clone();
        task.transition_to(&key, status, clock)?;
        self.replace_task(stage_id, task.clone())?;
        Ok(task)
    }

    /// Records a finished execution and moves the task out of `running`.
    ///
    /// # Errors
    ///
    /// Returns lookup errors or
    /// [`JobDomainError::InvalidStatusTransition`] when the task is not
    /// running.
    pub fn record_execution(
        &mut self,
        stage_id: &StageId,
        index: TaskIndex,
        execution: Execution,
        clock: &impl Clock,
    ) -> Result<Task, JobDomainError> {
        let key = self.task_key(stage_id, index);
        let mut task = self.task(stage_id, index)?.clone();
        task.record_execution(&key, execution, clock)?;
        self.replace_task(stage_id, task.clone())?;
        Ok(task)
    }

    fn stage_not_found(&self, stage_id: &StageId) -> JobDomainError {
        JobDomainError::StageNotFound {
            job_id: self.id.to_string(),
            stage_id: stage_id.to_string(),
        }
    }

    fn refresh_derived(&mut self) {
        for stage in &mut self.stages {
            stage.status = StageStatus::derive(&stage.tasks);
        }

        let total = self.stages.len();
        let completed = self
            .stages
            .iter()
            .filter(|stage| stage.status == StageStatus::Completed)
            .count();

        self.status = if total > 0 && completed == total {
            JobStatus::Completed
        } else if self
            .stages
            .iter()
            .any(|stage| stage.status != StageStatus::Pending)
        {
            JobStatus::InProgress
        } else {
            JobStatus::Pending
        };

        let percent = completed
            .saturating_mul(100)
            .checked_div(total)
            .unwrap_or_default();
        self.progress = u8::try_from(percent).unwrap_or(100);
        self.current_stage = self
            .stages
            .iter()
            .position(|stage| stage.status != StageStatus::Completed)
            .unwrap_or_else(|| total.saturating_sub(1));
    }
}
