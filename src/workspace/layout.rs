//! Task folder layout.

use crate::job::domain::{TaskKey, folder_slug};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

/// Directory holding the source snapshot; the tool's working directory.
pub const INPUT_DIR: &str = "input";
/// Directory holding per-execution artifacts.
pub const OUTPUT_DIR: &str = "output";
/// Directory holding rendered prompts and scratch data.
pub const DATA_DIR: &str = "data";

/// The three directories of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFolders {
    /// `{jobs_root}/{job_id}/{stage_id}/{index}_{slug}`.
    pub root: Utf8PathBuf,
    /// Source snapshot and tool working directory.
    pub input_dir: Utf8PathBuf,
    /// Execution artifacts, namespaced by execution id.
    pub output_dir: Utf8PathBuf,
    /// Rendered prompts and scratch files.
    pub data_dir: Utf8PathBuf,
}

impl TaskFolders {
    /// Computes the folder paths for a task without touching the disk.
    #[must_use]
    pub fn locate(jobs_root: &Utf8Path, key: &TaskKey, task_name: &str) -> Self {
        let root = jobs_root
            .join(key.job_id.to_string())
            .join(key.stage_id.as_str())
            .join(format!("{}_{}", key.task_index, folder_slug(task_name)));
        Self {
            input_dir: root.join(INPUT_DIR),
            output_dir: root.join(OUTPUT_DIR),
            data_dir: root.join(DATA_DIR),
            root,
        }
    }
}
