//! Errors returned by the task execution service.

use crate::job::domain::{JobId, TaskKey};
use crate::job::services::JobStoreError;
use crate::workspace::WorkspaceError;
use thiserror::Error;
use tokio::task::JoinError;

/// Errors that prevent an execution from starting or being recorded.
///
/// Failures inside a started execution are reported through
/// [`ExecutionReport`](super::ExecutionReport) instead.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Another execution of the task holds its lock.
    #[error("task {0} is already executing")]
    ConcurrentExecution(TaskKey),
    /// A job of the task is executing, so it cannot be deleted.
    #[error("job {0} has running executions")]
    JobBusy(JobId),
    /// The job store failed or the task does not exist.
    #[error(transparent)]
    Store(#[from] JobStoreError),
    /// Task folders could not be read or removed.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    /// Background work stopped before it could report, for example because
    /// the runtime shut down.
    #[error("background work was interrupted: {0}")]
    Interrupted(#[from] JoinError),
}

/// Result type for task execution operations.
pub type ExecutionResult<T> = Result<T, ExecutionError>;
