//! Structured events emitted by the external tool in stream-json mode.

use crate::logs::LogLevel;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Maximum characters of tool-use input echoed into the log trace.
const TOOL_INPUT_PREVIEW: usize = 160;

/// One newline-delimited message from the tool's standard output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Session lifecycle message (`system/init`).
    System(SystemEvent),
    /// Model output: text and tool-use blocks.
    Assistant(MessageEvent),
    /// Tool results fed back to the model.
    User(MessageEvent),
    /// Final outcome of the invocation.
    Result(ResultEvent),
    /// Any message type this decoder does not understand.
    #[serde(other)]
    Unknown,
}

/// Payload of a `system` event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SystemEvent {
    /// Event subtype, `init` when a session starts.
    #[serde(default)]
    pub subtype: String,
    /// Session identifier assigned by the tool.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Model the session runs against.
    #[serde(default)]
    pub model: Option<String>,
}

/// Payload of an `assistant` or `user` event.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MessageEvent {
    /// The wrapped message.
    #[serde(default)]
    pub message: MessageBody,
}

/// Message carried by [`MessageEvent`].
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MessageBody {
    /// Content blocks in emission order.
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

/// A content block inside a message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text.
        #[serde(default)]
        text: String,
    },
    /// A tool invocation requested by the model.
    ToolUse {
        /// Tool name.
        #[serde(default)]
        name: String,
        /// Tool arguments.
        #[serde(default)]
        input: Value,
    },
    /// The outcome of a tool invocation.
    ToolResult {
        /// Whether the tool failed.
        #[serde(default)]
        is_error: bool,
        /// Tool output, a string or a list of blocks.
        #[serde(default)]
        content: Value,
    },
    /// Any block type this decoder does not understand.
    #[serde(other)]
    Other,
}

/// Payload of a `result` event.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ResultEvent {
    /// `success` or an error subtype such as `error_during_execution`.
    #[serde(default)]
    pub subtype: String,
    /// Whether the tool considers the run failed.
    #[serde(default)]
    pub is_error: bool,
    /// Final answer or error text.
    #[serde(default)]
    pub result: Option<String>,
    /// Wall-clock duration reported by the tool.
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// Number of model turns.
    #[serde(default)]
    pub num_turns: Option<u32>,
    /// Reported cost in US dollars.
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    /// Session identifier.
    #[serde(default)]
    pub session_id: Option<String>,
}

impl StreamEvent {
    /// Decodes one line, returning `None` when it is not a stream-json
    /// message.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        serde_json::from_str(line).ok()
    }

    /// Formats the event as log trace lines; every event yields at least one.
    #[must_use]
    pub fn log_lines(&self) -> Vec<(LogLevel, String)> {
        match self {
            Self::System(system) => system_lines(system),
            Self::Assistant(event) => or_placeholder(
                event.message.content.iter().filter_map(assistant_line).collect(),
                "assistant message without content",
            ),
            Self::User(event) => or_placeholder(
                event.message.content.iter().filter_map(user_line).collect(),
                "user message without tool results",
            ),
            Self::Result(result) => vec![result_line(result)],
            Self::Unknown => vec![(LogLevel::Debug, "unrecognised tool event".to_owned())],
        }
    }

    /// Returns the text this event contributes to the prompt transcript.
    #[must_use]
    pub fn transcript_text(&self) -> Option<String> {
        match self {
            Self::Assistant(event) => {
                let text: Vec<&str> = event
                    .message
                    .content
                    .iter()
                    .filter_map(|block| match block {
                        ContentBlock::Text { text } if !text.trim().is_empty() => {
                            Some(text.as_str())
                        }
                        _ => None,
                    })
                    .collect();
                (!text.is_empty()).then(|| text.join("\n"))
            }
            Self::Result(result) => result.result.clone().filter(|text| !text.trim().is_empty()),
            _ => None,
        }
    }
}

impl ResultEvent {
    /// Returns `true` when the tool reported a failure despite exiting.
    #[must_use]
    pub fn is_soft_failure(&self) -> bool {
        self.is_error || (!self.subtype.is_empty() && self.subtype != "success")
    }

    /// Human-readable description of a reported failure.
    #[must_use]
    pub fn failure_message(&self) -> String {
        let detail = self
            .result
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty());
        let summary = describe_result_subtype(&self.subtype);
        match detail {
            Some(text) => format!("{summary}: {text}"),
            None => summary,
        }
    }
}

/// Maps a `result` subtype onto a readable description.
#[must_use]
pub fn describe_result_subtype(subtype: &str) -> String {
    match subtype {
        "" | "success" => "tool reported an error".to_owned(),
        "error_during_execution" => "tool encountered an error during execution".to_owned(),
        "error_max_turns" => "tool reached its maximum number of turns".to_owned(),
        "timeout" => "tool timed out while processing the prompt".to_owned(),
        "resource_limit" => "tool hit a resource limit".to_owned(),
        "permission_denied" => "tool was denied permission for a required action".to_owned(),
        "network_error" => "tool lost connectivity to its backend".to_owned(),
        "invalid_input" => "tool rejected the prompt as invalid input".to_owned(),
        "tool_error" => "a tool used during the run failed".to_owned(),
        other => format!("tool reported error: {other}"),
    }
}

fn or_placeholder(lines: Vec<(LogLevel, String)>, placeholder: &str) -> Vec<(LogLevel, String)> {
    if lines.is_empty() {
        vec![(LogLevel::Debug, placeholder.to_owned())]
    } else {
        lines
    }
}

fn system_lines(system: &SystemEvent) -> Vec<(LogLevel, String)> {
    if system.subtype != "init" {
        return vec![(LogLevel::Debug, format!("system event: {}", system.subtype))];
    }
    let session = system.session_id.as_deref().map_or("unknown", session_suffix);
    let line = match system.model.as_deref() {
        Some(model) => format!("session {session} started ({model})"),
        None => format!("session {session} started"),
    };
    vec![(LogLevel::Info, line)]
}

fn session_suffix(session_id: &str) -> &str {
    let split = session_id
        .char_indices()
        .rev()
        .nth(7)
        .map_or(0, |(offset, _)| offset);
    session_id.get(split..).unwrap_or(session_id)
}

fn assistant_line(block: &ContentBlock) -> Option<(LogLevel, String)> {
    match block {
        ContentBlock::Text { text } if !text.trim().is_empty() => {
            Some((LogLevel::Info, text.trim().to_owned()))
        }
        ContentBlock::ToolUse { name, input } => {
            let preview = preview(&input.to_string());
            Some((LogLevel::Info, format!("tool {name} {preview}")))
        }
        _ => None,
    }
}

fn user_line(block: &ContentBlock) -> Option<(LogLevel, String)> {
    match block {
        ContentBlock::ToolResult { is_error: true, content } => {
            let text = match content {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            Some((LogLevel::Warn, format!("tool error: {}", preview(&text))))
        }
        ContentBlock::ToolResult { .. } => Some((LogLevel::Debug, "tool result".to_owned())),
        _ => None,
    }
}

fn result_line(result: &ResultEvent) -> (LogLevel, String) {
    if result.is_soft_failure() {
        return (LogLevel::Error, result.failure_message());
    }
    let mut parts = vec!["completed".to_owned()];
    if let Some(ms) = result.duration_ms {
        parts.push(format!("in {:.2?}", Duration::from_millis(ms)));
    }
    if let Some(cost) = result.total_cost_usd {
        parts.push(format!("| cost ${cost:.4}"));
    }
    if let Some(turns) = result.num_turns {
        parts.push(format!("| turns {turns}"));
    }
    (LogLevel::Info, parts.join(" "))
}

fn preview(text: &str) -> String {
    let flattened = text.replace('\n', " ");
    if flattened.chars().count() <= TOOL_INPUT_PREVIEW {
        return flattened;
    }
    let mut short: String = flattened.chars().take(TOOL_INPUT_PREVIEW).collect();
    short.push_str("...");
    short
}
