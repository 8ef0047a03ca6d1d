//! Per-task filesystem isolation: folders, input snapshots and artifacts.

mod artifacts;
mod error;
mod layout;
mod manager;
mod tree;

pub use artifacts::{
    ExecutionArtifacts, ExecutionManifest, LATEST_FILE, LatestExecution, MANIFEST_FILE,
    PromptTranscript, SUMMARY_FILE, content_digest, render_summary,
};
pub use error::WorkspaceError;
pub use layout::{DATA_DIR, INPUT_DIR, OUTPUT_DIR, TaskFolders};
pub use manager::WorkspaceManager;
pub use tree::{FileNode, FolderTree, MAX_TREE_DEPTH, list_tree};

#[cfg(test)]
mod tests;
