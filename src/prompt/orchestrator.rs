//! Prompt sequence resolution against the registry and the prompts tree.
//!
//! Agent prompts live at `{prompts_dir}/{agent}/{capability}/{file}` and
//! target prompts at `{prompts_dir}/targets/{target}/{file}`.

use super::{PromptDescriptor, PromptError, PromptRegistry, PromptSequence, SequenceStep};
use crate::job::domain::{AgentName, CapabilityName, PromptOrigin, TargetName};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::debug;

/// Summary of one registry step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSummary {
    /// Agent or target step.
    pub kind: PromptOrigin,
    /// What the step achieves.
    pub purpose: String,
    /// Number of files the step lists.
    pub count: usize,
}

/// Catalog entry describing one registered capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestrationInfo {
    /// Agent name.
    pub agent: AgentName,
    /// Capability name.
    pub capability: CapabilityName,
    /// Capability description.
    pub description: String,
    /// Step summaries in order.
    pub steps: Vec<StepSummary>,
}

/// Prompt file availability for one target selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetValidation {
    /// Target checked, or `None` when no targets were selected.
    pub target: Option<TargetName>,
    /// Number of prompts the sequence expands to.
    pub total_prompts: usize,
    /// Prompt files present on disk.
    pub found_prompts: Vec<Utf8PathBuf>,
    /// Prompt files missing from disk.
    pub missing_prompts: Vec<Utf8PathBuf>,
}

/// Result of [`PromptOrchestrator::validate_orchestration`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Agent checked.
    pub agent: AgentName,
    /// Capability checked.
    pub capability: CapabilityName,
    /// `true` when no prompt file is missing.
    pub valid: bool,
    /// Per-target findings.
    pub targets: Vec<TargetValidation>,
}

/// Resolves `(agent, capability, targets)` into ordered prompt descriptors.
#[derive(Debug, Clone)]
pub struct PromptOrchestrator {
    prompts_dir: Utf8PathBuf,
    registry: PromptRegistry,
}

impl PromptOrchestrator {
    /// Creates an orchestrator over an explicit registry.
    #[must_use]
    pub fn new(prompts_dir: impl Into<Utf8PathBuf>, registry: PromptRegistry) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            registry,
        }
    }

    /// Creates an orchestrator whose registry comes from
    /// [`PromptRegistry::load`].
    ///
    /// # Errors
    ///
    /// Propagates registry loading errors.
    pub fn load(prompts_dir: impl Into<Utf8PathBuf>) -> Result<Self, PromptError> {
        let dir = prompts_dir.into();
        let registry = PromptRegistry::load(&dir)?;
        Ok(Self::new(dir, registry))
    }

    /// Returns the prompts directory.
    #[must_use]
    pub fn prompts_dir(&self) -> &Utf8Path {
        &self.prompts_dir
    }

    /// Returns the registry.
    #[must_use]
    pub const fn registry(&self) -> &PromptRegistry {
        &self.registry
    }

    /// Resolves the ordered prompt sequence.
    ///
    /// Agent steps contribute one descriptor per listed file. Target steps
    /// contribute one descriptor per selected target at that position, so
    /// `[agent:[a1], target:t, agent:[a2]]` with targets `[rust, go]` yields
    /// `[a1, targets/rust/t, targets/go/t, a2]`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::NoSequence`] when nothing is registered,
    /// [`PromptError::MissingPromptFiles`] listing every absent file, or
    /// [`PromptError::EmptySequence`] when nothing would run.
    pub fn resolve_sequence(
        &self,
        agent: &AgentName,
        capability: &CapabilityName,
        targets: &[TargetName],
    ) -> Result<Vec<PromptDescriptor>, PromptError> {
        let sequence = self.lookup(agent, capability)?;
        let descriptors = self.expand(agent, capability, sequence, targets);

        let missing: Vec<Utf8PathBuf> = descriptors
            .iter()
            .filter(|descriptor| !descriptor.path.is_file())
            .map(|descriptor| descriptor.path.clone())
            .collect();
        if !missing.is_empty() {
            return Err(PromptError::MissingPromptFiles(missing));
        }
        if descriptors.is_empty() {
            return Err(PromptError::EmptySequence {
                agent: agent.clone(),
                capability: capability.clone(),
            });
        }

        debug!(
            agent = %agent,
            capability = %capability,
            prompts = descriptors.len(),
            "resolved prompt sequence"
        );
        Ok(descriptors)
    }

    /// Lists every registered capability with its step summary.
    #[must_use]
    pub fn orchestration_info(&self) -> Vec<OrchestrationInfo> {
        self.registry
            .entries()
            .map(|(agent, capability, sequence)| OrchestrationInfo {
                agent: agent.clone(),
                capability: capability.clone(),
                description: sequence.description.clone(),
                steps: sequence
                    .steps
                    .iter()
                    .map(|step| match step {
                        SequenceStep::Agent { files, purpose } => StepSummary {
                            kind: PromptOrigin::Agent,
                            purpose: purpose.clone(),
                            count: files.len(),
                        },
                        SequenceStep::Target { purpose, .. } => StepSummary {
                            kind: PromptOrigin::Target,
                            purpose: purpose.clone(),
                            count: 1,
                        },
                    })
                    .collect(),
            })
            .collect()
    }

    /// Reports which prompt files exist for each target, without failing on
    /// missing files.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::NoSequence`] when nothing is registered.
    pub fn validate_orchestration(
        &self,
        agent: &AgentName,
        capability: &CapabilityName,
        targets: &[TargetName],
    ) -> Result<ValidationReport, PromptError> {
        let sequence = self.lookup(agent, capability)?;
        let selections: Vec<Option<TargetName>> = if targets.is_empty() {
            vec![None]
        } else {
            targets.iter().cloned().map(Some).collect()
        };

        let mut report = ValidationReport {
            agent: agent.clone(),
            capability: capability.clone(),
            valid: true,
            targets: Vec::with_capacity(selections.len()),
        };
        for selection in selections {
            let chosen: Vec<TargetName> = selection.iter().cloned().collect();
            let descriptors = self.expand(agent, capability, sequence, &chosen);
            let (found, missing): (Vec<_>, Vec<_>) = descriptors
                .into_iter()
                .map(|descriptor| descriptor.path)
                .partition(|path| path.is_file());
            report.valid &= missing.is_empty();
            report.targets.push(TargetValidation {
                target: selection,
                total_prompts: found.len() + missing.len(),
                found_prompts: found,
                missing_prompts: missing,
            });
        }
        Ok(report)
    }

    /// Reads the prompt document behind `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Io`] when the file cannot be read.
    pub fn read_prompt(&self, descriptor: &PromptDescriptor) -> Result<String, PromptError> {
        std::fs::read_to_string(&descriptor.path)
            .map_err(|err| PromptError::io(descriptor.path.clone(), err))
    }

    fn lookup(
        &self,
        agent: &AgentName,
        capability: &CapabilityName,
    ) -> Result<&PromptSequence, PromptError> {
        self.registry
            .sequence(agent, capability)
            .ok_or_else(|| PromptError::NoSequence {
                agent: agent.clone(),
                capability: capability.clone(),
            })
    }

    fn expand(
        &self,
        agent: &AgentName,
        capability: &CapabilityName,
        sequence: &PromptSequence,
        targets: &[TargetName],
    ) -> Vec<PromptDescriptor> {
        let mut descriptors: Vec<PromptDescriptor> = Vec::new();
        for step in &sequence.steps {
            match step {
                SequenceStep::Agent { files, purpose } => {
                    for file in files {
                        descriptors.push(PromptDescriptor {
                            position: descriptors.len() + 1,
                            display_name: file.clone(),
                            file_name: file.clone(),
                            path: self
                                .prompts_dir
                                .join(agent.as_str())
                                .join(capability.as_str())
                                .join(file),
                            origin: PromptOrigin::Agent,
                            target: None,
                            purpose: purpose.clone(),
                        });
                    }
                }
                SequenceStep::Target { file, purpose } => {
                    for target in targets {
                        descriptors.push(PromptDescriptor {
                            position: descriptors.len() + 1,
                            display_name: format!("targets/{target}/{file}"),
                            file_name: file.clone(),
                            path: self
                                .prompts_dir
                                .join("targets")
                                .join(target.as_str())
                                .join(file),
                            origin: PromptOrigin::Target,
                            target: Some(target.clone()),
                            purpose: purpose.clone(),
                        });
                    }
                }
            }
        }
        descriptors
    }
}
