//! Unit tests for stream decoding and the subprocess runner.

mod stream_tests;

use crate::execution::ToolCommand;
use crate::logs::{LogLevel, LogSink};
use camino::Utf8PathBuf;
use std::sync::{Mutex, PoisonError};
use tempfile::TempDir;

/// POSIX shell script imitating the external tool's stream-json output.
///
/// The prompt file decides the behaviour: `SLEEP` stalls, `ORPHAN` starts a
/// background `sleep`, records its pid in `grandchild.pid` and waits for it,
/// `CRASH` exits non-zero, `SOFT_FAIL` reports an error and exits cleanly.
/// Successful runs leave `produced.txt` in the working directory.
pub(crate) const FAKE_TOOL_SCRIPT: &str = r#"#!/bin/sh
prompt="$1"
echo '{"type":"system","subtype":"init","session_id":"session-0123456789","model":"fake"}'
if grep -q SLEEP "$prompt"; then
  sleep 30
fi
if grep -q ORPHAN "$prompt"; then
  sleep 60 &
  echo $! > grandchild.pid
  wait
fi
if grep -q CRASH "$prompt"; then
  echo "boom" >&2
  exit 3
fi
printf '{"type":"assistant","message":{"content":[{"type":"text","text":"working on it"},'
printf '{"type":"tool_use","name":"Read","input":{"path":"src/main.rs"}}]}}\n'
echo "plain diagnostic line"
if grep -q SOFT_FAIL "$prompt"; then
  echo '{"type":"result","subtype":"error_during_execution","is_error":true,"result":"could not finish"}'
  exit 0
fi
echo "done" > produced.txt
printf '{"type":"result","subtype":"success","is_error":false,"result":"all done",'
printf '"duration_ms":1500,"num_turns":2,"total_cost_usd":0.0123}'
"#;

/// Temporary directory holding the fake tool and a working directory.
pub(crate) struct FakeTool {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl FakeTool {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
        std::fs::write(root.join("fake_tool.sh"), FAKE_TOOL_SCRIPT).expect("write fake tool");
        std::fs::create_dir_all(root.join("work")).expect("create work dir");
        Self { _dir: dir, root }
    }

    pub(crate) fn command(&self) -> ToolCommand {
        ToolCommand::new("sh", [self.root.join("fake_tool.sh").to_string()])
    }

    pub(crate) fn work_dir(&self) -> Utf8PathBuf {
        self.root.join("work")
    }

    pub(crate) fn write_prompt(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.root.join(name);
        std::fs::write(&path, contents).expect("write prompt");
        path
    }
}

/// Sink collecting every logged line.
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingSink {
    pub(crate) fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|(_, line)| line.contains(needle))
    }
}

impl LogSink for RecordingSink {
    fn log(&self, level: LogLevel, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_owned()));
    }
}
