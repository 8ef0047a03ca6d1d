//! Folder structure manager.
//!
//! Owns `{data_dir}/jobs/{job_id}/{stage_id}/{index}_{slug}/{input,output,data}`.
//! Folder creation is idempotent and never touches existing contents.
//! `input/` is replaced wholesale from a staged copy; `output/` and `data/`
//! only ever gain new per-execution subdirectories.

use super::{
    ExecutionArtifacts, ExecutionManifest, FolderTree, LATEST_FILE, LatestExecution,
    MANIFEST_FILE, SUMMARY_FILE, TaskFolders, WorkspaceError, render_summary,
};
use crate::fs_utils::{open_dir, open_or_create_dir, write_atomic};
use crate::job::domain::{ExecutionId, JobId, TaskKey};
use crate::prompt::PromptDescriptor;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8::Dir;
use serde::Serialize;
use std::io;
use std::sync::Arc;
use tracing::{debug, error};

const STAGING_PREFIX: &str = ".input-staging-";
const RETIRED_PREFIX: &str = ".input-retired-";

/// Creates and maintains per-task folders.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    jobs_root: Utf8PathBuf,
}

impl WorkspaceManager {
    /// Creates a manager storing task folders under `{data_dir}/jobs`.
    #[must_use]
    pub fn new(data_dir: impl AsRef<Utf8Path>) -> Self {
        Self {
            jobs_root: data_dir.as_ref().join("jobs"),
        }
    }

    /// Returns the root of all job folders.
    #[must_use]
    pub fn jobs_root(&self) -> &Utf8Path {
        &self.jobs_root
    }

    /// Computes the folder paths for a task without touching the disk.
    #[must_use]
    pub fn locate(&self, key: &TaskKey, task_name: &str) -> TaskFolders {
        TaskFolders::locate(&self.jobs_root, key, task_name)
    }

    /// Creates the task's `input/`, `output/` and `data/` directories.
    ///
    /// Calling this repeatedly is a no-op for existing directories.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] when a directory cannot be created.
    pub fn ensure_task_folders(
        &self,
        key: &TaskKey,
        task_name: &str,
    ) -> Result<TaskFolders, WorkspaceError> {
        let folders = self.locate(key, task_name);
        for dir in [&folders.input_dir, &folders.output_dir, &folders.data_dir] {
            open_or_create_dir(dir).map_err(|err| WorkspaceError::io(dir.clone(), err))?;
        }
        Ok(folders)
    }

    /// Replaces `input/` with a snapshot of `source`.
    ///
    /// The snapshot is copied into a staging directory next to `input/` and
    /// swapped in only once complete, so a failed copy leaves the previous
    /// snapshot untouched. Symbolic links in the source are skipped. A
    /// regular-file source is copied into `input/` under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::SourceUnreadable`] when the source cannot be
    /// read, or [`WorkspaceError::Io`] when staging or swapping fails.
    pub fn populate_input(
        &self,
        folders: &TaskFolders,
        source: &Utf8Path,
    ) -> Result<(), WorkspaceError> {
        let metadata = std::fs::metadata(source)
            .map_err(|err| WorkspaceError::unreadable(source, err))?;

        open_or_create_dir(&folders.root)
            .map_err(|err| WorkspaceError::io(folders.root.clone(), err))?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&folders.root)
            .map_err(|err| WorkspaceError::io(folders.root.clone(), err))?;
        let staging_path = utf8(staging.path())?;
        let staging_dir =
            open_dir(&staging_path).map_err(|err| WorkspaceError::io(staging_path.clone(), err))?;

        if metadata.is_dir() {
            let source_dir =
                open_dir(source).map_err(|err| WorkspaceError::unreadable(source, err))?;
            copy_tree(&source_dir, &staging_dir)
                .map_err(|err| WorkspaceError::unreadable(source, err))?;
        } else {
            let name = source.file_name().unwrap_or("source");
            let parent = source.parent().unwrap_or_else(|| Utf8Path::new("."));
            let parent_dir =
                open_dir(parent).map_err(|err| WorkspaceError::unreadable(source, err))?;
            parent_dir
                .copy(name, &staging_dir, name)
                .map_err(|err| WorkspaceError::unreadable(source, err))?;
        }

        swap_input(folders, &staging_path)?;
        // The staging guard only removes the directory if the swap did not
        // move it into place.
        drop(staging);
        debug!(source = %source, input = %folders.input_dir, "input snapshot replaced");
        Ok(())
    }

    /// Writes a rendered prompt to `data/{execution_id}/{stem}.md`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] when the file cannot be written.
    pub fn write_rendered_prompt(
        &self,
        folders: &TaskFolders,
        execution_id: ExecutionId,
        descriptor: &PromptDescriptor,
        rendered: &str,
    ) -> Result<Utf8PathBuf, WorkspaceError> {
        let path = folders
            .data_dir
            .join(execution_id.to_string())
            .join(format!("{}.md", descriptor.artifact_stem()));
        write_file(&path, rendered.as_bytes())?;
        Ok(path)
    }

    /// Persists per-prompt transcripts, `summary.md` and `manifest.json`
    /// under `output/{execution_id}/`, then points `output/latest.json` at
    /// this execution. Earlier executions are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when an artifact cannot be encoded or
    /// written.
    pub fn persist_outputs(
        &self,
        folders: &TaskFolders,
        artifacts: &ExecutionArtifacts<'_>,
    ) -> Result<Utf8PathBuf, WorkspaceError> {
        let execution = artifacts.execution;
        let dir = folders.output_dir.join(execution.execution_id.to_string());

        for transcript in artifacts.transcripts {
            let path = dir.join(format!("{}.md", transcript.stem));
            write_file(&path, transcript.body.as_bytes())?;
        }
        write_file(&dir.join(SUMMARY_FILE), render_summary(artifacts).as_bytes())?;
        write_json(
            &dir.join(MANIFEST_FILE),
            &ExecutionManifest::new(artifacts.key, execution),
            "execution manifest",
        )?;
        write_json(
            &folders.output_dir.join(LATEST_FILE),
            &LatestExecution {
                execution_id: execution.execution_id,
                status: execution.status,
                finished_at: execution.finished_at,
            },
            "latest execution pointer",
        )?;
        debug!(output = %dir, "execution outputs persisted");
        Ok(dir)
    }

    /// Lists the task's `input/`, `output/` and `data/` trees.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] when a directory cannot be read.
    pub fn list_files(&self, folders: &TaskFolders) -> Result<FolderTree, WorkspaceError> {
        FolderTree::list(folders)
    }

    /// Removes every folder of a job.
    ///
    /// This deletes the whole job directory, including anything a
    /// file-backed job store kept there, so call it only once the job record
    /// is gone.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] when removal fails; a missing job
    /// folder is not an error.
    pub fn remove_job(&self, job_id: JobId) -> Result<(), WorkspaceError> {
        let path = self.jobs_root.join(job_id.to_string());
        match std::fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(WorkspaceError::io(path, err)),
        }
    }
}

fn swap_input(folders: &TaskFolders, staged: &Utf8Path) -> Result<(), WorkspaceError> {
    let retired = folders
        .root
        .join(format!("{RETIRED_PREFIX}{}", uuid::Uuid::new_v4()));
    let had_previous = folders.input_dir.exists();
    if had_previous {
        std::fs::rename(&folders.input_dir, &retired)
            .map_err(|err| WorkspaceError::io(folders.input_dir.clone(), err))?;
    }
    if let Err(err) = std::fs::rename(staged, &folders.input_dir) {
        if had_previous {
            return Err(roll_back_swap(&retired, &folders.input_dir, err));
        }
        return Err(WorkspaceError::io(folders.input_dir.clone(), err));
    }
    if had_previous {
        std::fs::remove_dir_all(&retired).map_err(|err| WorkspaceError::io(retired, err))?;
    }
    Ok(())
}

/// Moves the retired snapshot back into `input_dir` after a failed swap.
pub(super) fn roll_back_swap(
    retired: &Utf8Path,
    input_dir: &Utf8Path,
    swap_err: io::Error,
) -> WorkspaceError {
    match std::fs::rename(retired, input_dir) {
        Ok(()) => WorkspaceError::io(input_dir, swap_err),
        Err(restore_err) => {
            error!(
                retired = %retired,
                input = %input_dir,
                error = %restore_err,
                "previous input snapshot could not be restored"
            );
            WorkspaceError::SnapshotStranded {
                retired: retired.to_path_buf(),
                source: Arc::new(swap_err),
            }
        }
    }
}

fn utf8(path: &std::path::Path) -> Result<Utf8PathBuf, WorkspaceError> {
    Utf8PathBuf::from_path_buf(path.to_path_buf())
        .map_err(|raw| WorkspaceError::NonUtf8Path(raw.display().to_string()))
}

fn write_file(path: &Utf8Path, contents: &[u8]) -> Result<(), WorkspaceError> {
    write_atomic(path, contents).map_err(|err| WorkspaceError::io(path, err))
}

fn write_json<T: Serialize>(
    path: &Utf8Path,
    value: &T,
    what: &'static str,
) -> Result<(), WorkspaceError> {
    let encoded = serde_json::to_vec_pretty(value).map_err(|err| WorkspaceError::Encode {
        what,
        message: err.to_string(),
    })?;
    write_file(path, &encoded)
}

fn copy_tree(from: &Dir, to: &Dir) -> io::Result<()> {
    for item in from.entries()? {
        let entry = item?;
        let name = entry.file_name()?;
        let file_type = entry.file_type()?;
        if file_type.is_symlink() {
            continue;
        }
        if file_type.is_dir() {
            to.create_dir(&name)?;
            copy_tree(&entry.open_dir()?, &to.open_dir(&name)?)?;
        } else if file_type.is_file() {
            from.copy(&name, to, &name)?;
        }
    }
    Ok(())
}
