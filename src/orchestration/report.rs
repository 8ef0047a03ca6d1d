//! Result returned to callers of the execute operation.

use crate::job::domain::{
    Execution, ExecutionFailure, ExecutionId, ExecutionStatus, PromptResult, TaskKey,
};
use camino::Utf8PathBuf;
use serde::Serialize;

/// Overall status plus every per-prompt result of one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    /// Executed task.
    pub task: TaskKey,
    /// Identifier of the execution attempt.
    pub execution_id: ExecutionId,
    /// Terminal status.
    pub status: ExecutionStatus,
    /// Per-prompt results in execution order.
    pub prompt_results: Vec<PromptResult>,
    /// Failure that aborted the attempt, if any.
    pub failure: Option<ExecutionFailure>,
    /// Directory holding this execution's artifacts, when persisted.
    pub output_dir: Option<Utf8PathBuf>,
}

impl ExecutionReport {
    /// Builds a report from a finished execution.
    #[must_use]
    pub fn new(task: TaskKey, execution: &Execution, output_dir: Option<Utf8PathBuf>) -> Self {
        Self {
            task,
            execution_id: execution.execution_id,
            status: execution.status,
            prompt_results: execution.prompt_results.clone(),
            failure: execution.failure.clone(),
            output_dir,
        }
    }

    /// Returns `true` when every prompt succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }
}
