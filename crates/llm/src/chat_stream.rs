//! Chat Stream Assembly
//!
//! Converts model output chunks into caller-facing `ChatEvent`s. Tool call
//! chunks become `tool_call` events; text chunks are fed through the
//! `StreamingDeltaParser` and surface as `message_chunk` deltas. Finishing the
//! stream emits the final `actions` (when any) and `done`.

use std::collections::HashMap;

use choreo_rca_core::ChatEvent;
use serde_json::Value;

use crate::delta_parser::StreamingDeltaParser;

/// One chunk of streamed model output.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelChunk {
    /// A (possibly partial) tool call; later chunks of the same call carry no name
    ToolCallChunk { name: Option<String>, args: Value },
    /// Structured response text
    Text(String),
}

/// Builds the chat event stream for one request.
pub struct ChatStreamAssembler {
    request_id: String,
    parser: StreamingDeltaParser,
    active_forms: HashMap<String, String>,
}

impl ChatStreamAssembler {
    /// Create an assembler with a fresh `msg_<hex>` request id.
    pub fn new(active_forms: HashMap<String, String>) -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self::with_request_id(format!("msg_{}", &hex[..12]), active_forms)
    }

    pub fn with_request_id(
        request_id: impl Into<String>,
        active_forms: HashMap<String, String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            parser: StreamingDeltaParser::new(),
            active_forms,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Feed one chunk, returning the event it produces, if any.
    pub fn handle(&mut self, chunk: ModelChunk) -> Option<ChatEvent> {
        match chunk {
            ModelChunk::ToolCallChunk { name, args } => {
                let tool = name.filter(|n| !n.is_empty())?;
                tracing::debug!("Model called tool '{}' ({})", tool, self.request_id);
                Some(ChatEvent::ToolCall {
                    active_form: self.active_forms.get(&tool).cloned(),
                    tool,
                    args,
                })
            }
            ModelChunk::Text(text) => {
                if text.is_empty() {
                    return None;
                }
                self.parser
                    .push(&text)
                    .map(|content| ChatEvent::MessageChunk { content })
            }
        }
    }

    /// Close the stream: `actions` when any were decoded, then `done`.
    pub fn finish(self) -> Vec<ChatEvent> {
        let mut events = Vec::with_capacity(2);
        if !self.parser.actions().is_empty() {
            events.push(ChatEvent::Actions {
                actions: self.parser.actions().to_vec(),
            });
        }
        events.push(ChatEvent::Done {
            message: self.parser.message().to_string(),
        });
        events
    }

    /// Error event for a failed stream. The cause is logged, not exposed.
    pub fn fail(&self, cause: &dyn std::fmt::Display) -> ChatEvent {
        tracing::error!("Chat stream error ({}): {}", self.request_id, cause);
        ChatEvent::Error {
            message: format!("An error occurred (request_id: {})", self.request_id),
        }
    }
}
