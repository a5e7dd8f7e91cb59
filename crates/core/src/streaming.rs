//! Stream Event Types
//!
//! Caller-facing events for the two newline-delimited JSON streams:
//!
//! - `PatchEvent` - remediation progress (`patch_started` ... `patch_done`)
//! - `ChatEvent` - conversational output (`tool_call`, `message_chunk`, ...)
//!
//! Both serialize with a `type` tag so a client can switch on one field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreResult;

/// Per-action status carried by patch progress and result events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchStatus {
    Applying,
    Success,
    Failed,
    Skipped,
}

/// Event emitted by a remediation patch run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatchEvent {
    /// Setup finished, per-action events follow
    PatchStarted,

    /// An action is about to be applied
    PatchProgress {
        index: usize,
        action: String,
        status: PatchStatus,
    },

    /// Outcome of one change group of an action
    PatchResult {
        index: usize,
        action: String,
        status: PatchStatus,
        details: String,
    },

    /// Run complete
    PatchDone { summary: String },

    /// Setup failed; nothing else follows
    Error { message: String },
}

impl PatchEvent {
    pub fn progress(index: usize, action: impl Into<String>) -> Self {
        PatchEvent::PatchProgress {
            index,
            action: action.into(),
            status: PatchStatus::Applying,
        }
    }

    pub fn result(
        index: usize,
        action: impl Into<String>,
        status: PatchStatus,
        details: impl Into<String>,
    ) -> Self {
        PatchEvent::PatchResult {
            index,
            action: action.into(),
            status,
            details: details.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        PatchEvent::Error {
            message: message.into(),
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PatchEvent::PatchDone { .. } | PatchEvent::Error { .. })
    }

    /// Render as one NDJSON line, newline included.
    pub fn to_ndjson(&self) -> CoreResult<String> {
        to_ndjson(self)
    }
}

/// Event emitted by a chat stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// The model started calling a gateway tool
    ToolCall {
        tool: String,
        /// Present-progressive label for the UI, when one is known
        #[serde(rename = "activeForm")]
        active_form: Option<String>,
        args: Value,
    },

    /// New text appended to the response message
    MessageChunk { content: String },

    /// Final remediation actions proposed by the response
    Actions { actions: Vec<Value> },

    /// Stream complete
    Done { message: String },

    /// Stream failed
    Error { message: String },
}

impl ChatEvent {
    /// Render as one NDJSON line, newline included.
    pub fn to_ndjson(&self) -> CoreResult<String> {
        to_ndjson(self)
    }
}

fn to_ndjson<T: Serialize>(event: &T) -> CoreResult<String> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    Ok(line)
}
