//! Temporary prompts, sources and data directories wired to the fixture tool.

use camino::{Utf8Path, Utf8PathBuf};
use gropius::config::OrchestratorConfig;
use gropius::execution::ToolCommand;
use gropius::job::adapters::json_file::JsonFileJobRepository;
use gropius::job::domain::{JobSpec, StageSpec, TaskSpec};
use gropius::job::services::JobStoreService;
use gropius::orchestration::adapters::InMemoryCredentialProvider;
use gropius::orchestration::{ExecutionComponents, TaskExecutionService};
use mockable::DefaultClock;
use std::sync::Arc;
use tempfile::TempDir;

/// Service type exercised by the integration tests.
pub type FileService = TaskExecutionService<JsonFileJobRepository, DefaultClock>;

/// Path of the POSIX script imitating the external tool.
pub const FAKE_TOOL: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/fake_tool.sh");

/// Agent prompt of the `code_architect/analyze` sequence.
pub const ANALYZE_PROMPT: &str = "code_architect/analyze/01_analyze_codebase.md";

/// Rust target prompt of the `code_architect/analyze` sequence.
pub const RUST_TARGET_PROMPT: &str = "targets/rust/01_analyze.md";

/// Owns a temporary directory laid out like a deployment.
pub struct Workbench {
    _dir: TempDir,
    root: Utf8PathBuf,
    config: OrchestratorConfig,
}

impl Workbench {
    /// Creates sources, prompts and a configuration using the fixture tool.
    ///
    /// # Errors
    ///
    /// Returns an error when the temporary tree cannot be written.
    pub fn new() -> eyre::Result<Self> {
        let dir = TempDir::new()?;
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .map_err(|path| eyre::eyre!("non UTF-8 temp dir: {}", path.display()))?;
        let config = OrchestratorConfig {
            data_dir: root.join("data"),
            prompts_dir: root.join("prompts"),
            sources_dir: root.join("sources"),
            tool: ToolCommand::new("sh", [FAKE_TOOL]),
            prompt_timeout_secs: 20,
            ..OrchestratorConfig::default()
        };
        let bench = Self {
            _dir: dir,
            root,
            config,
        };
        bench.write("sources/demo/main.py", "print('hello')\n")?;
        bench.write("sources/demo/lib/util.py", "def helper():\n    return 1\n")?;
        bench.write_prompt(
            ANALYZE_PROMPT,
            "Analyse {{job_name}} ({{source_ref}}) for {{targets}}.",
        )?;
        bench.write_prompt(RUST_TARGET_PROMPT, "Map the patterns to {{target_name}}.")?;
        Ok(bench)
    }

    /// Returns the workbench configuration.
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns the temporary root.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Overrides the per-prompt timeout, in seconds.
    pub const fn set_timeout_secs(&mut self, secs: u64) {
        self.config.prompt_timeout_secs = secs;
    }

    /// Writes a prompt file below the prompts directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn write_prompt(&self, relative: &str, contents: &str) -> eyre::Result<()> {
        self.write(&format!("prompts/{relative}"), contents)
    }

    /// Deletes a prompt file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be removed.
    pub fn remove_prompt(&self, relative: &str) -> eyre::Result<()> {
        std::fs::remove_file(self.config.prompts_dir.join(relative))?;
        Ok(())
    }

    /// Builds a service persisting jobs under the data directory.
    ///
    /// Services built from the same workbench share stored jobs but not
    /// execution locks or logs, like separate processes would.
    ///
    /// # Errors
    ///
    /// Returns an error when the prompt registry cannot be loaded.
    pub fn service(&self) -> eyre::Result<FileService> {
        self.service_with_credentials(InMemoryCredentialProvider::new())
    }

    /// Builds a service resolving credentials from `credentials`.
    ///
    /// # Errors
    ///
    /// Returns an error when the prompt registry cannot be loaded.
    pub fn service_with_credentials(
        &self,
        credentials: InMemoryCredentialProvider,
    ) -> eyre::Result<FileService> {
        let clock = Arc::new(DefaultClock);
        let store = JobStoreService::new(
            Arc::new(JsonFileJobRepository::new(self.config.data_dir.clone())),
            Arc::clone(&clock),
        );
        let components =
            ExecutionComponents::from_config(&self.config, Arc::new(credentials), clock)?;
        Ok(TaskExecutionService::new(store, components)
            .with_prompt_timeout(self.config.prompt_timeout()))
    }

    fn write(&self, relative: &str, contents: &str) -> eyre::Result<()> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Job `name` over the `demo` source with one `code_architect/analyze`
/// task `T0` in stage `s1`.
pub fn analyze_job<I, S>(name: &str, targets: I) -> JobSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    JobSpec::new(name, "demo").with_targets(targets).with_stage(
        StageSpec::new("s1", "S1").with_task(TaskSpec::new("T0", "code_architect", "analyze")),
    )
}
