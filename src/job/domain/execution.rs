//! Execution records: one concrete run attempt of a task.

use super::{ExecutionId, TargetName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a prompt in a resolved sequence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptOrigin {
    /// Agent-level prompt, executed once regardless of target selection.
    Agent,
    /// Target-level prompt, executed once per selected target.
    Target,
}

impl PromptOrigin {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Target => "target",
        }
    }
}

/// Outcome of a single prompt invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStatus {
    /// The tool exited cleanly without reporting an error.
    Success,
    /// The invocation failed, softly or hard.
    Failed,
}

/// Failure taxonomy shared by prompt results and executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Missing registry entry or prompt file.
    Configuration,
    /// Spawn failure or non-zero exit.
    Process,
    /// The per-prompt deadline elapsed.
    Timeout,
    /// The tool reported an error in its own output but exited cleanly.
    ToolReported,
    /// Folder creation, copy or persistence failure.
    Filesystem,
}

impl FailureKind {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Process => "process",
            Self::Timeout => "timeout",
            Self::ToolReported => "tool_reported",
            Self::Filesystem => "filesystem",
        }
    }

    /// Returns `true` when this failure stops the remaining prompt sequence.
    #[must_use]
    pub const fn aborts_sequence(self) -> bool {
        !matches!(self, Self::ToolReported)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of executing one resolved prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptResult {
    /// Prompt file as shown to users (`01_analyze.md`,
    /// `targets/rust/01_analyze.md`).
    pub prompt_file: String,
    /// Agent or target origin.
    pub origin: PromptOrigin,
    /// Target the prompt was fanned out for, if any.
    pub target_name: Option<TargetName>,
    /// Success or failure.
    pub status: PromptStatus,
    /// Human-readable failure description.
    pub error: Option<String>,
    /// Failure classification, present when `status` is `failed`.
    pub failure_kind: Option<FailureKind>,
    /// SHA-256 of the rendered prompt text, hex encoded.
    pub prompt_sha256: Option<String>,
    /// Time the tool was started.
    pub started_at: DateTime<Utc>,
    /// Time the tool finished or was killed.
    pub finished_at: DateTime<Utc>,
}

impl PromptResult {
    /// Returns `true` when the prompt succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == PromptStatus::Success
    }

    /// Returns `true` when this result must stop the remaining sequence.
    #[must_use]
    pub fn aborts_sequence(&self) -> bool {
        self.failure_kind.is_some_and(FailureKind::aborts_sequence)
    }
}

/// Terminal status of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Every prompt succeeded.
    Completed,
    /// At least one prompt failed, or the execution aborted before running.
    Failed,
}

impl ExecutionStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Execution-level failure recorded when the task aborted before or between
/// prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    /// Failure classification.
    pub kind: FailureKind,
    /// Human-readable description.
    pub message: String,
}

/// One concrete run attempt of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Unique identifier of this attempt.
    pub execution_id: ExecutionId,
    /// Terminal status.
    pub status: ExecutionStatus,
    /// Per-prompt results in execution order.
    pub prompt_results: Vec<PromptResult>,
    /// Failure that aborted the attempt, if any.
    pub failure: Option<ExecutionFailure>,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time.
    pub finished_at: DateTime<Utc>,
}

impl Execution {
    /// Derives the terminal status from the prompt results and failure.
    ///
    /// The attempt is failed when any prompt failed, including soft
    /// tool-reported failures followed by successful prompts, or when an
    /// execution-level failure was recorded.
    #[must_use]
    pub fn derive_status(
        prompt_results: &[PromptResult],
        failure: Option<&ExecutionFailure>,
    ) -> ExecutionStatus {
        if failure.is_some() || prompt_results.iter().any(|result| !result.is_success()) {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        }
    }
}
