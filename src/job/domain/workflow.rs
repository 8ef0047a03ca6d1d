//! Default migration workflow used when a job is created without stages.

use super::{StageSpec, TaskSpec};

struct StageTemplate {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    agents: &'static [&'static str],
    tasks: &'static [(&'static str, &'static str, &'static str)],
}

const DEFAULT_STAGES: &[StageTemplate] = &[
    StageTemplate {
        id: "project_setup",
        name: "Project Setup",
        description: "Initialize the project and notify the team",
        agents: &["Project Manager"],
        tasks: &[("Project Kickoff", "project_manager", "project_kickoff")],
    },
    StageTemplate {
        id: "code_analysis",
        name: "Code Analysis & Planning",
        description: "Analyze the source codebase and plan the migration",
        agents: &["Code Architect"],
        tasks: &[
            ("Analyze Source Structure", "code_architect", "analyze"),
            ("Create Migration Plan", "code_architect", "plan"),
        ],
    },
    StageTemplate {
        id: "code_migration",
        name: "Code Migration",
        description: "Transform the source into the target frameworks",
        agents: &["Code Engineer"],
        tasks: &[
            ("Migrate Core Components", "code_engineer", "migrate"),
            ("Refactor Business Logic", "code_engineer", "refactor"),
        ],
    },
    StageTemplate {
        id: "validation_fix",
        name: "Validation & Fix",
        description: "Test the migrated code and fix regressions",
        agents: &["QA Engineer"],
        tasks: &[
            ("Run Validation Tests", "qa_engineer", "test"),
            ("Validate Migration", "qa_engineer", "validate"),
        ],
    },
    StageTemplate {
        id: "deployment_prep",
        name: "Deployment Preparation",
        description: "Prepare pipelines and infrastructure",
        agents: &["DevOps Engineer"],
        tasks: &[("Setup CI/CD Pipeline", "devops_engineer", "setup_ci_cd")],
    },
    StageTemplate {
        id: "project_closure",
        name: "Project Closure",
        description: "Report on the migration and archive artifacts",
        agents: &["Project Manager"],
        tasks: &[("Generate Status Report", "project_manager", "status_report")],
    },
];

/// Returns the stage specs of the default migration workflow.
///
/// Every task uses an agent/capability pair present in the built-in prompt
/// registry.
#[must_use]
pub fn default_workflow() -> Vec<StageSpec> {
    DEFAULT_STAGES
        .iter()
        .map(|template| {
            template.tasks.iter().fold(
                StageSpec::new(template.id, template.name)
                    .with_description(template.description)
                    .with_agents(template.agents.iter().map(|agent| (*agent).to_owned())),
                |stage, (name, agent, capability)| {
                    stage.with_task(TaskSpec::new(*name, *agent, *capability))
                },
            )
        })
        .collect()
}
