//! Static registry of prompt sequences keyed by agent and capability.
//!
//! The registry is resolved once at startup, either from the built-in table
//! or from `registry.json` in the prompts directory. Entries are plain file
//! names; directory structure is supplied by the orchestrator.

use super::PromptError;
use crate::job::domain::{AgentName, CapabilityName};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;

/// Name of the optional registry document inside the prompts directory.
pub const REGISTRY_FILE: &str = "registry.json";

/// One step of a registered sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SequenceStep {
    /// Agent-level prompts, executed once each in listed order.
    Agent {
        /// Prompt file names under `{agent}/{capability}/`.
        #[serde(rename = "prompts")]
        files: Vec<String>,
        /// What the step achieves.
        #[serde(default)]
        purpose: String,
    },
    /// Target-level prompt, executed once per selected target.
    Target {
        /// Prompt file name under `targets/{target}/`.
        #[serde(rename = "prompt")]
        file: String,
        /// What the step achieves.
        #[serde(default)]
        purpose: String,
    },
}

impl SequenceStep {
    /// Creates an agent step.
    #[must_use]
    pub fn agent<I, S>(files: I, purpose: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Agent {
            files: files.into_iter().map(Into::into).collect(),
            purpose: purpose.into(),
        }
    }

    /// Creates a target step.
    #[must_use]
    pub fn target(file: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self::Target {
            file: file.into(),
            purpose: purpose.into(),
        }
    }

    /// Returns the step purpose.
    #[must_use]
    pub fn purpose(&self) -> &str {
        match self {
            Self::Agent { purpose, .. } | Self::Target { purpose, .. } => purpose,
        }
    }

    fn file_names(&self) -> Vec<&str> {
        match self {
            Self::Agent { files, .. } => files.iter().map(String::as_str).collect(),
            Self::Target { file, .. } => vec![file.as_str()],
        }
    }
}

/// An ordered list of steps with a description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSequence {
    /// Human-readable summary of the capability.
    #[serde(default)]
    pub description: String,
    /// Steps in execution order.
    #[serde(rename = "sequence")]
    pub steps: Vec<SequenceStep>,
}

impl PromptSequence {
    /// Creates a sequence.
    #[must_use]
    pub fn new(description: impl Into<String>, steps: Vec<SequenceStep>) -> Self {
        Self {
            description: description.into(),
            steps,
        }
    }
}

type RegistryDocument = BTreeMap<String, BTreeMap<String, PromptSequence>>;

/// Mapping from `(agent, capability)` to a prompt sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptRegistry {
    sequences: BTreeMap<(AgentName, CapabilityName), PromptSequence>,
}

impl PromptRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a sequence.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::InvalidPromptFile`] when a step names a file
    /// that is not a plain file name.
    pub fn register(
        &mut self,
        agent: AgentName,
        capability: CapabilityName,
        sequence: PromptSequence,
    ) -> Result<(), PromptError> {
        for step in &sequence.steps {
            for file in step.file_names() {
                validate_file_name(file)?;
            }
        }
        self.sequences.insert((agent, capability), sequence);
        Ok(())
    }

    /// Looks up a sequence.
    #[must_use]
    pub fn sequence(
        &self,
        agent: &AgentName,
        capability: &CapabilityName,
    ) -> Option<&PromptSequence> {
        self.sequences.get(&(agent.clone(), capability.clone()))
    }

    /// Iterates over all registered sequences in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&AgentName, &CapabilityName, &PromptSequence)> {
        self.sequences
            .iter()
            .map(|((agent, capability), sequence)| (agent, capability, sequence))
    }

    /// Returns the number of registered sequences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Parses a registry document.
    ///
    /// The document maps agent names to capability names to
    /// `{"description", "sequence": [{"type": "agent", "prompts": [..]} |
    /// {"type": "target", "prompt": ".."}]}`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::InvalidRegistry`] for malformed JSON and name
    /// or file validation errors for invalid entries.
    pub fn from_json(document: &str) -> Result<Self, PromptError> {
        let parsed: RegistryDocument = serde_json::from_str(document)
            .map_err(|err| PromptError::InvalidRegistry(err.to_string()))?;
        let mut registry = Self::new();
        for (agent, capabilities) in parsed {
            let agent_name = AgentName::new(&agent)?;
            for (capability, sequence) in capabilities {
                registry.register(agent_name.clone(), CapabilityName::new(&capability)?, sequence)?;
            }
        }
        Ok(registry)
    }

    /// Loads `{prompts_dir}/registry.json`, falling back to the built-in
    /// registry when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Io`] when the file exists but cannot be read,
    /// or a parse error from [`PromptRegistry::from_json`].
    pub fn load(prompts_dir: &Utf8Path) -> Result<Self, PromptError> {
        let path = prompts_dir.join(REGISTRY_FILE);
        match std::fs::read_to_string(&path) {
            Ok(document) => Self::from_json(&document),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::builtin()),
            Err(err) => Err(PromptError::io(path, err)),
        }
    }

    /// Returns the built-in migration registry.
    #[must_use]
    pub fn builtin() -> Self {
        let mut sequences = BTreeMap::new();
        for (agent, capability, sequence) in builtin_sequences() {
            if let (Ok(agent_name), Ok(capability_name)) =
                (AgentName::new(agent), CapabilityName::new(capability))
            {
                sequences.insert((agent_name, capability_name), sequence);
            }
        }
        Self { sequences }
    }
}

fn validate_file_name(file: &str) -> Result<(), PromptError> {
    let is_plain = !file.is_empty()
        && !file.starts_with('.')
        && !file.contains(['/', '\\'])
        && file != "..";
    if is_plain {
        Ok(())
    } else {
        Err(PromptError::InvalidPromptFile(file.to_owned()))
    }
}

fn builtin_sequences() -> Vec<(&'static str, &'static str, PromptSequence)> {
    vec![
        (
            "code_architect",
            "plan",
            PromptSequence::new(
                "Analyze source and create migration plan",
                vec![
                    SequenceStep::agent(
                        ["01_analyze_project_structure.md", "02_create_migration_plan.md"],
                        "Understand source architecture",
                    ),
                    SequenceStep::target("01_analyze.md", "Analyze target requirements"),
                    SequenceStep::target("02_plan.md", "Create target-specific migration plan"),
                    SequenceStep::agent(
                        ["03_design_target_architecture.md"],
                        "Design final architecture",
                    ),
                ],
            ),
        ),
        (
            "code_architect",
            "analyze",
            PromptSequence::new(
                "Deep analysis of source code",
                vec![
                    SequenceStep::agent(["01_analyze_codebase.md"], "Analyze source patterns"),
                    SequenceStep::target("01_analyze.md", "Map to target patterns"),
                ],
            ),
        ),
        (
            "code_engineer",
            "migrate",
            PromptSequence::new(
                "Execute code migration",
                vec![
                    SequenceStep::agent(["01_setup_target_project.md"], "Initialize target project"),
                    SequenceStep::target("03_migrate.md", "Execute target-specific migration"),
                    SequenceStep::agent(["02_migrate_data_models.md"], "Migrate data structures"),
                ],
            ),
        ),
        (
            "code_engineer",
            "refactor",
            PromptSequence::new(
                "Refactor migrated code",
                vec![
                    SequenceStep::target("04_validate.md", "Validate against target standards"),
                    SequenceStep::target("05_fix.md", "Fix target-specific issues"),
                ],
            ),
        ),
        (
            "qa_engineer",
            "test",
            PromptSequence::new(
                "Create and run tests",
                vec![
                    SequenceStep::agent(
                        ["01_analyze_test_requirements.md"],
                        "Understand testing needs",
                    ),
                    SequenceStep::target("04_validate.md", "Target-specific validation"),
                    SequenceStep::agent(["02_create_test_suite.md"], "Create comprehensive tests"),
                ],
            ),
        ),
        (
            "qa_engineer",
            "validate",
            PromptSequence::new(
                "Validate migration quality",
                vec![
                    SequenceStep::target("04_validate.md", "Target validation rules"),
                    SequenceStep::agent(["01_run_validation_suite.md"], "Execute validation"),
                ],
            ),
        ),
        (
            "devops_engineer",
            "setup_ci_cd",
            PromptSequence::new(
                "Setup CI/CD pipeline",
                vec![
                    SequenceStep::agent(
                        ["01_analyze_deployment_needs.md"],
                        "Understand deployment requirements",
                    ),
                    SequenceStep::target("03_migrate.md", "Target deployment patterns"),
                    SequenceStep::agent(["02_create_pipeline.md"], "Create CI/CD pipeline"),
                ],
            ),
        ),
        (
            "project_manager",
            "project_kickoff",
            PromptSequence::new(
                "Initialize project",
                vec![
                    SequenceStep::agent(["01_initialize_project.md"], "Setup project structure"),
                    SequenceStep::target("06_discuss.md", "Discuss target approach"),
                ],
            ),
        ),
        (
            "project_manager",
            "status_report",
            PromptSequence::new(
                "Generate status reports",
                vec![
                    SequenceStep::agent(["01_gather_metrics.md"], "Collect project metrics"),
                    SequenceStep::agent(["02_generate_report.md"], "Create status report"),
                ],
            ),
        ),
    ]
}
