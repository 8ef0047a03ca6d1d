//! Command line used to invoke the external tool.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

/// Token replaced with the rendered prompt path inside tool arguments.
pub const PROMPT_FILE_TOKEN: &str = "{prompt_file}";

/// Program and argument template for the external tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    /// Executable name or path.
    pub program: String,
    /// Arguments; [`PROMPT_FILE_TOKEN`] is substituted per invocation.
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Creates a command from a program and argument template.
    #[must_use]
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the arguments for one invocation.
    ///
    /// The prompt path replaces every [`PROMPT_FILE_TOKEN`]; when no argument
    /// mentions the token the path is appended instead.
    #[must_use]
    pub fn arguments_for(&self, prompt_file: &Utf8Path) -> Vec<String> {
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(PROMPT_FILE_TOKEN, prompt_file.as_str()))
            .collect();
        if !self.args.iter().any(|arg| arg.contains(PROMPT_FILE_TOKEN)) {
            args.push(prompt_file.to_string());
        }
        args
    }
}

impl Default for ToolCommand {
    fn default() -> Self {
        Self::new(
            "claude",
            [
                "-p",
                "Read and follow the instructions in {prompt_file}",
                "--output-format",
                "stream-json",
                "--verbose",
                "--allowedTools",
                "Read,Write,Edit,Bash",
            ],
        )
    }
}
