//! Subprocess-backed prompt runner.

use super::{
    EventStream, PromptRunReport, PromptRunRequest, PromptRunner, StreamEvent, StreamRecord,
    ToolCommand,
    exit::{describe_exit, describe_spawn_error, kill_process_group},
};
use crate::job::domain::{FailureKind, PromptResult, PromptStatus};
use crate::logs::{LogLevel, LogSink};
use crate::workspace::content_digest;
use async_trait::async_trait;
use mockable::Clock;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, warn};

/// Runs prompts by spawning the external tool once per prompt.
///
/// Each child gets its own process group so a timeout can kill the tool and
/// anything it started.
#[derive(Debug)]
pub struct CliPromptRunner<C: Clock + Send + Sync> {
    command: ToolCommand,
    clock: Arc<C>,
}

impl<C: Clock + Send + Sync> CliPromptRunner<C> {
    /// Creates a runner invoking `command`.
    #[must_use]
    pub const fn new(command: ToolCommand, clock: Arc<C>) -> Self {
        Self { command, clock }
    }

    /// Returns the configured tool command.
    #[must_use]
    pub const fn command(&self) -> &ToolCommand {
        &self.command
    }

    async fn supervise(
        &self,
        request: &PromptRunRequest<'_>,
        observer: &mut StreamObserver,
    ) -> Result<(), (FailureKind, String)> {
        let program = self.command.program.as_str();
        let mut command = Command::new(program);
        command
            .args(self.command.arguments_for(request.prompt_path))
            .current_dir(request.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|err| (FailureKind::Process, describe_spawn_error(program, &err)))?;
        let pid = child.id();
        debug!(pid, prompt = %request.descriptor.display_name, "tool started");

        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(collect_stderr(stderr)));
        let stdout = child.stdout.take();
        let log = request.log;
        let drive = async {
            if let Some(output) = stdout {
                let mut events = EventStream::new(output);
                while let Some(record) = events.next_record().await? {
                    observer.observe(record, log);
                }
            }
            let status = child.wait().await?;
            Ok::<ExitStatus, io::Error>(status)
        };
        let outcome = tokio::time::timeout(request.timeout, drive).await;

        match outcome {
            Err(_) => {
                warn!(
                    prompt = %request.descriptor.display_name,
                    timeout = ?request.timeout,
                    "tool exceeded its deadline; killing process group"
                );
                terminate(&mut child, pid).await;
                if let Some(task) = stderr_task {
                    task.abort();
                }
                Err((
                    FailureKind::Timeout,
                    format!("timeout: prompt exceeded its {:?} deadline", request.timeout),
                ))
            }
            Ok(Err(err)) => {
                terminate(&mut child, pid).await;
                Err((
                    FailureKind::Process,
                    format!("failed to read tool output: {err}"),
                ))
            }
            Ok(Ok(status)) => {
                let stderr = match stderr_task {
                    Some(task) => task.await.unwrap_or_default(),
                    None => String::new(),
                };
                if !status.success() {
                    return Err((FailureKind::Process, describe_exit(status.code(), &stderr)));
                }
                match observer.soft_failure.clone() {
                    Some(message) => Err((FailureKind::ToolReported, message)),
                    None => Ok(()),
                }
            }
        }
    }
}

#[async_trait]
impl<C: Clock + Send + Sync> PromptRunner for CliPromptRunner<C> {
    async fn run_prompt(&self, request: PromptRunRequest<'_>) -> PromptRunReport {
        let started_at = self.clock.utc();
        let mut observer = StreamObserver::default();
        let outcome = self.supervise(&request, &mut observer).await;
        let finished_at = self.clock.utc();

        let (status, failure_kind, error) = match outcome {
            Ok(()) => (PromptStatus::Success, None, None),
            Err((kind, message)) => {
                if kind != FailureKind::ToolReported {
                    request.log.log(LogLevel::Error, &message);
                }
                (PromptStatus::Failed, Some(kind), Some(message))
            }
        };
        let descriptor = request.descriptor;
        PromptRunReport {
            result: PromptResult {
                prompt_file: descriptor.display_name.clone(),
                origin: descriptor.origin,
                target_name: descriptor.target.clone(),
                status,
                error,
                failure_kind,
                prompt_sha256: Some(content_digest(request.rendered)),
                started_at,
                finished_at,
            },
            transcript: observer.transcript.join("\n\n"),
            session_id: observer.session_id,
        }
    }
}

/// Accumulates what the engine needs from the event stream.
#[derive(Debug, Default)]
struct StreamObserver {
    transcript: Vec<String>,
    session_id: Option<String>,
    soft_failure: Option<String>,
}

impl StreamObserver {
    fn observe(&mut self, record: StreamRecord, log: &dyn LogSink) {
        let event = match record {
            StreamRecord::Raw(line) => {
                log.log(LogLevel::Info, &line);
                return;
            }
            StreamRecord::Event(event) => event,
        };
        for (level, line) in event.log_lines() {
            log.log(level, &line);
        }
        if let Some(text) = event.transcript_text() {
            self.transcript.push(text);
        }
        match event {
            StreamEvent::System(system) => {
                if self.session_id.is_none() {
                    self.session_id = system.session_id;
                }
            }
            StreamEvent::Result(result) => {
                if result.is_soft_failure() && self.soft_failure.is_none() {
                    self.soft_failure = Some(result.failure_message());
                }
                if self.session_id.is_none() {
                    self.session_id = result.session_id;
                }
            }
            StreamEvent::Assistant(_) | StreamEvent::User(_) | StreamEvent::Unknown => {}
        }
    }
}

async fn collect_stderr(mut stderr: ChildStderr) -> String {
    let mut bytes = Vec::new();
    if let Err(err) = stderr.read_to_end(&mut bytes).await {
        debug!(error = %err, "failed to read tool stderr");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

async fn terminate(child: &mut Child, pid: Option<u32>) {
    if let Some(group) = pid {
        kill_process_group(group);
    }
    if let Err(err) = child.kill().await {
        debug!(error = %err, "tool already exited");
    }
}
