//! Folder tree listing for pollers.

use super::{TaskFolders, WorkspaceError};
use camino::Utf8Path;
use cap_std::fs_utf8::Dir;
use serde::Serialize;
use std::io;

/// Maximum directory depth reported by [`list_tree`].
pub const MAX_TREE_DEPTH: usize = 10;

const IGNORED_NAMES: &[&str] = &["__pycache__", "node_modules"];

/// A file or folder in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileNode {
    /// A regular file.
    File {
        /// Entry name.
        name: String,
        /// Size in bytes.
        size: u64,
    },
    /// A directory.
    Folder {
        /// Entry name.
        name: String,
        /// Children sorted by name; empty beyond the depth limit.
        children: Vec<FileNode>,
    },
}

impl FileNode {
    /// Returns the entry name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Folder { name, .. } => name,
        }
    }
}

/// Listing of a task's three directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderTree {
    /// Contents of `input/`.
    pub input: Vec<FileNode>,
    /// Contents of `output/`.
    pub output: Vec<FileNode>,
    /// Contents of `data/`.
    pub data: Vec<FileNode>,
}

impl FolderTree {
    pub(crate) fn list(folders: &TaskFolders) -> Result<Self, WorkspaceError> {
        Ok(Self {
            input: list_tree(&folders.input_dir)?,
            output: list_tree(&folders.output_dir)?,
            data: list_tree(&folders.data_dir)?,
        })
    }
}

/// Lists `path` recursively, hiding dot-files and dependency caches.
///
/// A missing directory lists as empty.
///
/// # Errors
///
/// Returns [`WorkspaceError::Io`] when an existing directory cannot be read.
pub fn list_tree(path: &Utf8Path) -> Result<Vec<FileNode>, WorkspaceError> {
    let dir = match Dir::open_ambient_dir(path, cap_std::ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(WorkspaceError::io(path, err)),
    };
    walk(&dir, 0).map_err(|err| WorkspaceError::io(path, err))
}

fn walk(dir: &Dir, depth: usize) -> io::Result<Vec<FileNode>> {
    if depth >= MAX_TREE_DEPTH {
        return Ok(Vec::new());
    }
    let mut nodes = Vec::new();
    for item in dir.entries()? {
        let entry = item?;
        let name = entry.file_name()?;
        if name.starts_with('.') || IGNORED_NAMES.contains(&name.as_str()) {
            continue;
        }
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            let child = entry.open_dir()?;
            nodes.push(FileNode::Folder {
                children: walk(&child, depth + 1)?,
                name,
            });
        } else if file_type.is_file() {
            let size = entry.metadata()?.len();
            nodes.push(FileNode::File { name, size });
        }
    }
    nodes.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(nodes)
}
