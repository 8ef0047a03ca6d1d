//! Domain model for jobs, stages, tasks and executions.

mod error;
mod execution;
mod ids;
mod job;
mod names;
mod task;
mod workflow;

pub use error::{JobDomainError, ParseStatusError};
pub use execution::{
    Execution, ExecutionFailure, ExecutionStatus, FailureKind, PromptOrigin, PromptResult,
    PromptStatus,
};
pub use ids::{ExecutionId, JobId, StageId, TaskIndex, TaskKey};
pub use job::{Job, JobSpec, JobStatus, Stage, StageSpec, StageStatus};
pub use names::{AgentName, CapabilityName, TargetName, folder_slug};
pub use task::{
    CREDENTIAL_ID_KEY, ConfigPatch, TARGETS_KEY, Task, TaskConfig, TaskSpec, TaskStatus,
};
pub use workflow::default_workflow;
