//! Process execution engine.
//!
//! Spawns the external tool once per rendered prompt, decodes its
//! newline-delimited stream-json output, forwards every event to the task's
//! log trace and classifies the outcome:
//!
//! - non-zero exit or an elapsed deadline is a hard failure;
//! - a clean exit after a reported error is a soft failure;
//! - anything else succeeds.

mod cli;
mod command;
mod event;
mod exit;
mod runner;
mod stream;

pub use cli::CliPromptRunner;
pub use command::{PROMPT_FILE_TOKEN, ToolCommand};
pub use event::{
    ContentBlock, MessageBody, MessageEvent, ResultEvent, StreamEvent, SystemEvent,
    describe_result_subtype,
};
pub use exit::{describe_exit, describe_spawn_error};
pub use runner::{PromptRunReport, PromptRunRequest, PromptRunner};
pub use stream::{EventStream, StreamRecord};

#[cfg(test)]
mod tests;
