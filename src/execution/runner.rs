//! Port for running one rendered prompt through the external tool.

use crate::job::domain::PromptResult;
use crate::logs::LogSink;
use crate::prompt::PromptDescriptor;
use async_trait::async_trait;
use camino::Utf8Path;
use std::time::Duration;

/// Inputs for a single prompt invocation.
#[derive(Clone, Copy)]
pub struct PromptRunRequest<'a> {
    /// The resolved prompt being executed.
    pub descriptor: &'a PromptDescriptor,
    /// Rendered prompt text.
    pub rendered: &'a str,
    /// Path the rendered prompt was written to; handed to the tool.
    pub prompt_path: &'a Utf8Path,
    /// Working directory of the tool, the task's `input/` folder.
    pub working_dir: &'a Utf8Path,
    /// Deadline for the whole invocation.
    pub timeout: Duration,
    /// Destination for the formatted event trace.
    pub log: &'a dyn LogSink,
}

impl std::fmt::Debug for PromptRunRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptRunRequest")
            .field("descriptor", &self.descriptor.display_name)
            .field("prompt_path", &self.prompt_path)
            .field("working_dir", &self.working_dir)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Outcome of a single prompt invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRunReport {
    /// Result recorded on the execution.
    pub result: PromptResult,
    /// Assistant text and final result text, in arrival order.
    pub transcript: String,
    /// Session identifier announced by the tool, if any.
    pub session_id: Option<String>,
}

/// Runs rendered prompts.
///
/// Implementations never return an error: every failure is classified and
/// reported through [`PromptResult`].
#[async_trait]
pub trait PromptRunner: Send + Sync {
    /// Runs one prompt to completion or until its deadline elapses.
    async fn run_prompt(&self, request: PromptRunRequest<'_>) -> PromptRunReport;
}
