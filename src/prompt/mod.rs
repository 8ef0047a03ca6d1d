//! Prompt orchestration: registry, sequence resolution and templating.
//!
//! - [`registry`] maps `(agent, capability)` to ordered steps
//! - [`orchestrator`] expands steps into [`PromptDescriptor`]s on disk
//! - [`template`] renders `{{name}}` placeholders against task context

mod descriptor;
mod error;
pub mod orchestrator;
pub mod registry;
pub mod template;

pub use descriptor::PromptDescriptor;
pub use error::PromptError;
pub use orchestrator::{
    OrchestrationInfo, PromptOrchestrator, StepSummary, TargetValidation, ValidationReport,
};
pub use registry::{PromptRegistry, PromptSequence, REGISTRY_FILE, SequenceStep};
pub use template::{TemplateContext, render, unresolved_placeholders};

#[cfg(test)]
mod tests;
