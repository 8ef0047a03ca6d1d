//! Template context for a task's prompts.

use super::ports::Secret;
use crate::job::domain::{ExecutionId, Job, Stage, Task, TargetName};
use crate::prompt::TemplateContext;
use crate::workspace::TaskFolders;
use serde_json::Value;

/// Context key holding the current target of a target step.
pub const TARGET_NAME_KEY: &str = "target_name";
/// Context key holding the resolved credential.
pub const CREDENTIAL_KEY: &str = "credential";

/// Inputs shared by every prompt of one execution.
#[derive(Debug, Clone, Copy)]
pub struct ContextSources<'a> {
    /// Owning job.
    pub job: &'a Job,
    /// Owning stage.
    pub stage: &'a Stage,
    /// Executed task.
    pub task: &'a Task,
    /// Targets the sequence was resolved for.
    pub targets: &'a [TargetName],
    /// Execution attempt.
    pub execution_id: ExecutionId,
    /// Task folders.
    pub folders: &'a TaskFolders,
    /// Credential named by the task configuration, if any.
    pub credential: Option<&'a Secret>,
}

/// Builds the flat context shared by all prompts of an execution.
///
/// Configuration entries are added first so that job and task fields always
/// win over configuration keys of the same name.
#[must_use]
pub fn base_context(sources: ContextSources<'_>) -> TemplateContext {
    let mut context = TemplateContext::new();
    for (key, value) in sources.task.config().iter() {
        let text = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        context.insert(key.clone(), text);
    }

    let job = sources.job;
    let targets: Vec<&str> = sources.targets.iter().map(TargetName::as_str).collect();
    let fields = [
        ("job_id", job.id().to_string()),
        ("job_name", job.name().to_owned()),
        ("job_description", job.description().to_owned()),
        ("source_ref", job.source_ref().to_owned()),
        ("target_ref", job.target_ref().to_owned()),
        ("targets", targets.join(", ")),
        ("stage_id", sources.stage.id().to_string()),
        ("stage_name", sources.stage.name().to_owned()),
        ("task_index", sources.task.index().to_string()),
        ("task_name", sources.task.name().to_owned()),
        ("agent", sources.task.agent().to_string()),
        ("capability", sources.task.capability().to_string()),
        ("execution_id", sources.execution_id.to_string()),
        ("input_dir", sources.folders.input_dir.to_string()),
        ("output_dir", sources.folders.output_dir.to_string()),
        ("data_dir", sources.folders.data_dir.to_string()),
    ];
    for (key, value) in fields {
        context.insert(key, value);
    }
    if let Some(secret) = sources.credential {
        context.insert(CREDENTIAL_KEY, secret.expose());
    }
    context
}

/// Extends `base` with the target of a target step.
#[must_use]
pub fn prompt_context(base: &TemplateContext, target: Option<&TargetName>) -> TemplateContext {
    match target {
        Some(name) => base.clone().with(TARGET_NAME_KEY, name.as_str()),
        None => base.clone(),
    }
}
