//! Readable descriptions of process failures.

use std::io;

/// Maximum characters of stderr appended to a failure description.
const STDERR_TAIL: usize = 2000;

/// Describes a non-zero exit, appending trimmed stderr when present.
#[must_use]
pub fn describe_exit(code: Option<i32>, stderr: &str) -> String {
    let summary = match code {
        Some(1) => "tool failed: invalid arguments or configuration (exit code 1)".to_owned(),
        Some(2) => "tool failed: file access issue (exit code 2)".to_owned(),
        Some(126) => "tool failed: permission denied, cannot execute (exit code 126)".to_owned(),
        Some(127) => "tool failed: command not found (exit code 127)".to_owned(),
        Some(130) => "tool interrupted (exit code 130)".to_owned(),
        Some(137) => "tool killed, possibly by memory limits (exit code 137)".to_owned(),
        Some(other) => format!("tool failed (exit code {other})"),
        None => "tool terminated by a signal".to_owned(),
    };
    match stderr_tail(stderr) {
        Some(tail) => format!("{summary}: {tail}"),
        None => summary,
    }
}

/// Describes a failure to start the tool.
#[must_use]
pub fn describe_spawn_error(program: &str, err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => format!("tool command not found: {program}"),
        io::ErrorKind::PermissionDenied => format!("permission denied executing {program}"),
        _ => format!("failed to start {program}: {err}"),
    }
}

fn stderr_tail(stderr: &str) -> Option<String> {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return None;
    }
    let total = trimmed.chars().count();
    if total <= STDERR_TAIL {
        return Some(trimmed.to_owned());
    }
    let tail: String = trimmed.chars().skip(total - STDERR_TAIL).collect();
    Some(format!("...{tail}"))
}

/// Sends `SIGKILL` to the process group led by `pid`.
#[cfg(unix)]
pub(crate) fn kill_process_group(pid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(err) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        tracing::debug!(pid, error = %err, "process group already gone");
    }
}

#[cfg(not(unix))]
pub(crate) const fn kill_process_group(_pid: u32) {}
