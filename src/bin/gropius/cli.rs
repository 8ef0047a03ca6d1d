//! Argument definitions for the `gropius` binary.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use gropius::config::OrchestratorConfig;
use gropius::job::domain::{ConfigPatch, JobId, StageId, TaskIndex, TaskKey};
use serde_json::Value;

/// Task execution orchestrator for AI-driven code migration.
#[derive(Debug, Parser)]
#[command(name = "gropius", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug diagnostics.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file.
    #[arg(long, global = true, env = "GROPIUS_CONFIG")]
    pub config: Option<Utf8PathBuf>,

    /// Root of persisted jobs and task folders.
    #[arg(long, global = true)]
    pub data_dir: Option<Utf8PathBuf>,

    /// Root of the prompt tree.
    #[arg(long, global = true)]
    pub prompts_dir: Option<Utf8PathBuf>,

    /// Root of source snapshots.
    #[arg(long, global = true)]
    pub sources_dir: Option<Utf8PathBuf>,

    /// Per-prompt timeout in seconds.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,
}

impl Cli {
    /// Loads configuration and applies command-line overrides.
    pub fn settings(&self) -> eyre::Result<OrchestratorConfig> {
        let mut config = OrchestratorConfig::load(self.config.as_deref())?;
        if let Some(dir) = &self.data_dir {
            config.data_dir.clone_from(dir);
        }
        if let Some(dir) = &self.prompts_dir {
            config.prompts_dir.clone_from(dir);
        }
        if let Some(dir) = &self.sources_dir {
            config.sources_dir.clone_from(dir);
        }
        if let Some(secs) = self.timeout_secs {
            eyre::ensure!(secs > 0, "--timeout-secs must be positive");
            config.prompt_timeout_secs = secs;
        }
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a job using the default migration workflow.
    CreateJob {
        /// Job name.
        #[arg(long)]
        name: String,
        /// Source reference resolved below the sources directory.
        #[arg(long)]
        source: String,
        /// Target framework; repeat for several.
        #[arg(long = "target")]
        targets: Vec<String>,
        /// Free-form target reference.
        #[arg(long, default_value = "")]
        target_ref: String,
        /// Job description.
        #[arg(long, default_value = "")]
        description: String,
    },

    /// List stored jobs.
    ListJobs,

    /// Print a job as JSON.
    ShowJob {
        /// Job identifier.
        job_id: JobId,
    },

    /// Delete a job with its folders and logs.
    DeleteJob {
        /// Job identifier.
        job_id: JobId,
    },

    /// Update a task's configuration.
    Configure {
        #[command(flatten)]
        task: TaskArgs,
        /// `key=value` entry; values parse as JSON, falling back to text.
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, Value)>,
        /// Key to remove.
        #[arg(long = "unset")]
        unset: Vec<String>,
    },

    /// List registered agent capabilities.
    Catalog,

    /// Resolve and print the prompt sequence for a capability.
    Sequence {
        /// Agent name.
        agent: String,
        /// Capability name.
        capability: String,
        /// Target framework; repeat for several.
        #[arg(long = "target")]
        targets: Vec<String>,
    },

    /// Report which prompt files exist for a capability.
    Validate {
        /// Agent name.
        agent: String,
        /// Capability name.
        capability: String,
        /// Target framework; repeat for several.
        #[arg(long = "target")]
        targets: Vec<String>,
    },

    /// Execute a task, streaming its log to stderr.
    Execute {
        #[command(flatten)]
        task: TaskArgs,
        /// `id=ENV_VAR` pair exposing a credential from the environment.
        #[arg(long = "credential", value_parser = parse_credential)]
        credentials: Vec<(String, String)>,
    },

    /// Print a task's input, output and data trees.
    Files {
        #[command(flatten)]
        task: TaskArgs,
    },
}

/// Addresses one task within a job.
#[derive(Debug, Args)]
pub struct TaskArgs {
    /// Job identifier.
    pub job_id: JobId,
    /// Stage identifier.
    pub stage: String,
    /// Zero-based task index within the stage.
    pub task_index: u32,
}

impl TaskArgs {
    /// Builds the task key.
    pub fn key(&self) -> eyre::Result<TaskKey> {
        Ok(TaskKey::new(
            self.job_id,
            StageId::new(&self.stage)?,
            TaskIndex::new(self.task_index),
        ))
    }
}

/// Turns `--set` and `--unset` arguments into a configuration patch.
pub fn config_patch(set: Vec<(String, Value)>, unset: Vec<String>) -> ConfigPatch {
    let mut patch: ConfigPatch = set.into_iter().collect();
    patch.extend(unset.into_iter().map(|key| (key, Value::Null)));
    patch
}

pub fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = split_pair(raw)?;
    let parsed = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
    Ok((key.to_owned(), parsed))
}

pub fn parse_credential(raw: &str) -> Result<(String, String), String> {
    let (id, variable) = split_pair(raw)?;
    if variable.is_empty() {
        return Err(format!("missing environment variable name in '{raw}'"));
    }
    Ok((id.to_owned(), variable.to_owned()))
}

fn split_pair(raw: &str) -> Result<(&str, &str), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    Ok((trimmed, value.trim()))
}
