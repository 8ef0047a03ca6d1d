//! Error types for job domain validation and parsing.

use super::{TaskKey, TaskStatus};
use thiserror::Error;

/// Errors returned while constructing or mutating job domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobDomainError {
    /// The job name is empty after trimming.
    #[error("job name must not be empty")]
    EmptyJobName,

    /// The source reference is empty after trimming.
    #[error("job source reference must not be empty")]
    EmptySourceRef,

    /// A name (stage, agent, capability or target) is empty after
    /// normalization.
    #[error("{kind} name must not be empty")]
    EmptyName {
        /// Which kind of name was rejected.
        kind: &'static str,
    },

    /// A name contains characters outside `[a-z0-9_-]` after normalization.
    #[error(
        "{kind} name '{value}' contains invalid characters (only lowercase alphanumeric, '_' and '-' allowed)"
    )]
    InvalidName {
        /// Which kind of name was rejected.
        kind: &'static str,
        /// The raw value supplied by the caller.
        value: String,
    },

    /// The task name is empty after trimming.
    #[error("task name must not be empty")]
    EmptyTaskName,

    /// Two stages share the same identifier.
    #[error("duplicate stage identifier: {0}")]
    DuplicateStage(String),

    /// A stage has no tasks.
    #[error("stage {0} must contain at least one task")]
    EmptyStage(String),

    /// The requested stage does not exist in the job.
    #[error("stage {stage_id} not found in job {job_id}")]
    StageNotFound {
        /// Job identifier in display form.
        job_id: String,
        /// Stage identifier.
        stage_id: String,
    },

    /// The requested task does not exist in the stage.
    #[error("task {0} not found")]
    TaskNotFound(TaskKey),

    /// The requested status change is not allowed by the task state machine.
    #[error("invalid status transition for task {key}: {from} -> {to}")]
    InvalidStatusTransition {
        /// Task whose status was to change.
        key: TaskKey,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },
}

/// Error returned while parsing a status value from persistence or input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown status: {0}")]
pub struct ParseStatusError(pub String);
