//! Task entity, task status state machine and per-task configuration.

use super::{
    AgentName, CapabilityName, Execution, JobDomainError, ParseStatusError, TargetName, TaskIndex,
    TaskKey,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Configuration key naming the credential to inject into prompt context.
pub const CREDENTIAL_ID_KEY: &str = "credential_id";

/// Configuration key overriding the job's target selection for one task.
pub const TARGETS_KEY: &str = "targets";

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Never executed.
    Pending,
    /// An execution holds the task lock.
    Running,
    /// The latest execution succeeded.
    Completed,
    /// The latest execution failed.
    Failed,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` when the state machine allows moving to `target`.
    ///
    /// `pending -> running -> {completed, failed}`; a finished task may go
    /// back to `running` for an explicit re-run. Nothing skips `running`.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending | Self::Completed | Self::Failed, Self::Running)
                | (Self::Running, Self::Completed | Self::Failed)
        )
    }

    /// Returns `true` for `completed` and `failed`.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseStatusError(value.to_owned())),
        }
    }
}

/// Partial configuration update. A `null` value removes the key.
pub type ConfigPatch = Map<String, Value>;

/// Arbitrary key/value configuration attached to a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskConfig(BTreeMap<String, Value>);

impl TaskConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a single value, returning the updated configuration.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Merges a patch into the configuration.
    pub fn apply_patch(&mut self, patch: ConfigPatch) {
        for (key, value) in patch {
            if value.is_null() {
                self.0.remove(&key);
            } else {
                self.0.insert(key, value);
            }
        }
    }

    /// Returns the raw value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Returns the credential reference, if configured.
    #[must_use]
    pub fn credential_id(&self) -> Option<&str> {
        self.0.get(CREDENTIAL_ID_KEY).and_then(Value::as_str)
    }

    /// Returns the task-level target override, if configured.
    ///
    /// Accepts either a JSON array of strings or a comma-separated string.
    ///
    /// # Errors
    ///
    /// Returns a name validation error when an entry is not a valid target
    /// name.
    pub fn targets(&self) -> Result<Option<Vec<TargetName>>, JobDomainError> {
        let Some(value) = self.0.get(TARGETS_KEY) else {
            return Ok(None);
        };
        let raw: Vec<&str> = match value {
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            Value::String(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .collect(),
            _ => Vec::new(),
        };
        raw.into_iter()
            .map(TargetName::new)
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

/// Creation-time description of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    /// Human-readable task name.
    pub name: String,
    /// Raw agent name, normalized on creation.
    pub agent: String,
    /// Raw capability name, normalized on creation.
    pub capability: String,
    /// Initial configuration.
    pub config: TaskConfig,
}

impl TaskSpec {
    /// Creates a task spec with an empty configuration.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        agent: impl Into<String>,
        capability: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            agent: agent.into(),
            capability: capability.into(),
            config: TaskConfig::new(),
        }
    }

    /// Sets the initial configuration.
    #[must_use]
    pub fn with_config(mut self, config: TaskConfig) -> Self {
        self.config = config;
        self
    }
}

/// A unit of work assigned to one agent/capability pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    index: TaskIndex,
    name: String,
    agent: AgentName,
    capability: CapabilityName,
    status: TaskStatus,
    config: TaskConfig,
    executions: Vec<Execution>,
    updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a pending task from its spec.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError`] when the name is empty or the agent or
    /// capability name is invalid.
    pub fn from_spec(
        index: TaskIndex,
        spec: TaskSpec,
        clock: &impl Clock,
    ) -> Result<Self, JobDomainError> {
        let name = spec.name.trim().to_owned();
        if name.is_empty() {
            return Err(JobDomainError::EmptyTaskName);
        }
        Ok(Self {
            index,
            name,
            agent: AgentName::new(&spec.agent)?,
            capability: CapabilityName::new(&spec.capability)?,
            status: TaskStatus::Pending,
            config: spec.config,
            executions: Vec::new(),
            updated_at: clock.utc(),
        })
    }

    /// Returns the immutable position of the task in its stage.
    #[must_use]
    pub const fn index(&self) -> TaskIndex {
        self.index
    }

    /// Returns the task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the assigned agent.
    #[must_use]
    pub const fn agent(&self) -> &AgentName {
        &self.agent
    }

    /// Returns the assigned capability.
    #[must_use]
    pub const fn capability(&self) -> &CapabilityName {
        &self.capability
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the task configuration.
    #[must_use]
    pub const fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Returns all recorded executions, oldest first.
    #[must_use]
    pub fn executions(&self) -> &[Execution] {
        &self.executions
    }

    /// Returns the most recent execution, if any.
    #[must_use]
    pub fn last_execution(&self) -> Option<&Execution> {
        self.executions.last()
    }

    /// Returns the time of the last mutation.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Applies a configuration patch.
    pub fn patch_config(&mut self, patch: ConfigPatch, clock: &impl Clock) {
        self.config.apply_patch(patch);
        self.updated_at = clock.utc();
    }

    /// Moves the task to `target` when the state machine allows it.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::InvalidStatusTransition`] otherwise.
    pub fn transition_to(
        &mut self,
        key: &TaskKey,
        target: TaskStatus,
        clock: &impl Clock,
    ) -> Result<(), JobDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(JobDomainError::InvalidStatusTransition {
                key: key.clone(),
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.updated_at = clock.utc();
        Ok(())
    }

    /// Records a finished execution and moves the task out of `running`.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::InvalidStatusTransition`] when the task is
    /// not currently running.
    pub fn record_execution(
        &mut self,
        key: &TaskKey,
        execution: Execution,
        clock: &impl Clock,
    ) -> Result<(), JobDomainError> {
        let target = match execution.status {
            super::ExecutionStatus::Completed => TaskStatus::Completed,
            super::ExecutionStatus::Failed => TaskStatus::Failed,
        };
        self.transition_to(key, target, clock)?;
        self.executions.push(execution);
        Ok(())
    }
}
