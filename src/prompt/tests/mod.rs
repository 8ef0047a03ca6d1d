//! Unit tests for prompt registry, resolution and templating.

mod template_tests;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

/// Temporary prompts tree.
pub(super) struct PromptsTree {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl PromptsTree {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn write(&self, relative: &str, contents: &str) {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create prompt dir");
        }
        std::fs::write(path, contents).expect("write prompt");
    }
}
