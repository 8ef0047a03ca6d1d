//! Resolved, ready-to-render prompt references.

use crate::job::domain::{PromptOrigin, TargetName};
use camino::Utf8PathBuf;
use serde::Serialize;

/// One entry of a resolved prompt sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptDescriptor {
    /// 1-based position in the resolved sequence.
    pub position: usize,
    /// Name shown to users and recorded in results: the bare file name for
    /// agent prompts, `targets/{target}/{file}` for target prompts.
    pub display_name: String,
    /// Registry file name.
    pub file_name: String,
    /// Absolute or prompts-dir-relative path of the prompt document.
    pub path: Utf8PathBuf,
    /// Agent or target origin.
    pub origin: PromptOrigin,
    /// Target for fanned-out steps.
    pub target: Option<TargetName>,
    /// Purpose of the registry step that produced this prompt.
    pub purpose: String,
}

impl PromptDescriptor {
    /// Returns the artifact stem used for per-prompt files
    /// (`02_rust_01_analyze`).
    #[must_use]
    pub fn artifact_stem(&self) -> String {
        let stem = self
            .file_name
            .rsplit_once('.')
            .map_or(self.file_name.as_str(), |(stem, _)| stem);
        match &self.target {
            Some(target) => format!("{:02}_{target}_{stem}", self.position),
            None => format!("{:02}_{stem}", self.position),
        }
    }
}
