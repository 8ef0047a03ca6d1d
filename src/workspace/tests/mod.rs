//! Unit tests for task folders, input snapshots and artifacts.


use crate::job::domain::{JobId, StageId, TaskIndex, TaskKey};
use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

pub(super) struct Scratch {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Scratch {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, relative: &str) -> Utf8PathBuf {
        self.root.join(relative)
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn write(&self, relative: &str, contents: &str) -> Utf8PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(&path, contents).expect("write file");
        path
    }
}

pub(super) fn task_key() -> TaskKey {
    TaskKey::new(
        JobId::new(),
        StageId::new("s1").expect("valid stage id"),
        TaskIndex::new(0),
    )
}
