//! Execution artifacts: per-prompt transcripts, summary and manifest.

use crate::job::domain::{
    Execution, ExecutionFailure, ExecutionId, ExecutionStatus, PromptResult, TaskKey,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// File name of the machine-readable manifest.
pub const MANIFEST_FILE: &str = "manifest.json";
/// File name of the combined markdown summary.
pub const SUMMARY_FILE: &str = "summary.md";
/// File name of the pointer to the newest execution.
pub const LATEST_FILE: &str = "latest.json";

/// Tool output captured for one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTranscript {
    /// Artifact stem, for example `02_rust_01_analyze`.
    pub stem: String,
    /// Prompt name as recorded in the result.
    pub prompt_file: String,
    /// Assistant text and final result text.
    pub body: String,
}

/// Everything persisted for one execution.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionArtifacts<'a> {
    /// Task the execution belongs to.
    pub key: &'a TaskKey,
    /// Task name for headings.
    pub task_name: &'a str,
    /// The finished execution.
    pub execution: &'a Execution,
    /// Per-prompt transcripts in execution order.
    pub transcripts: &'a [PromptTranscript],
}

/// Machine-readable record written to `output/{execution_id}/manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionManifest {
    /// Execution identifier.
    pub execution_id: ExecutionId,
    /// Task address.
    pub task: TaskKey,
    /// Terminal status.
    pub status: ExecutionStatus,
    /// Execution-level failure, if any.
    pub failure: Option<ExecutionFailure>,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time.
    pub finished_at: DateTime<Utc>,
    /// Per-prompt results.
    pub prompts: Vec<PromptResult>,
}

impl ExecutionManifest {
    /// Builds the manifest for an execution.
    #[must_use]
    pub fn new(key: &TaskKey, execution: &Execution) -> Self {
        Self {
            execution_id: execution.execution_id,
            task: key.clone(),
            status: execution.status,
            failure: execution.failure.clone(),
            started_at: execution.started_at,
            finished_at: execution.finished_at,
            prompts: execution.prompt_results.clone(),
        }
    }
}

/// Pointer to the newest execution, rewritten after every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestExecution {
    /// Execution identifier.
    pub execution_id: ExecutionId,
    /// Terminal status.
    pub status: ExecutionStatus,
    /// End time.
    pub finished_at: DateTime<Utc>,
}

/// Hex-encoded SHA-256 of `text`.
#[must_use]
pub fn content_digest(text: &str) -> String {
    Sha256::digest(text.as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Renders the combined markdown summary.
#[must_use]
pub fn render_summary(artifacts: &ExecutionArtifacts<'_>) -> String {
    let execution = artifacts.execution;
    let mut lines = vec![
        format!("# Execution {}", execution.execution_id),
        String::new(),
        format!("- Task: {} ({})", artifacts.task_name, artifacts.key),
        format!("- Status: {}", execution.status.as_str()),
        format!("- Started: {}", execution.started_at.to_rfc3339()),
        format!("- Finished: {}", execution.finished_at.to_rfc3339()),
    ];
    if let Some(failure) = &execution.failure {
        lines.push(format!("- Failure ({}): {}", failure.kind, failure.message));
    }
    lines.push(String::new());
    lines.push("| # | Prompt | Origin | Target | Status | Error |".to_owned());
    lines.push("|---|--------|--------|--------|--------|-------|".to_owned());
    for (position, result) in execution.prompt_results.iter().enumerate() {
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} |",
            position + 1,
            result.prompt_file,
            result.origin.as_str(),
            result.target_name.as_ref().map_or("", |t| t.as_str()),
            if result.is_success() { "success" } else { "failed" },
            table_cell(result.error.as_deref().unwrap_or("")),
        ));
    }
    for transcript in artifacts.transcripts {
        lines.push(String::new());
        lines.push(format!("## {}", transcript.prompt_file));
        lines.push(String::new());
        lines.push(transcript.body.trim_end().to_owned());
    }
    lines.push(String::new());
    lines.join("\n")
}
