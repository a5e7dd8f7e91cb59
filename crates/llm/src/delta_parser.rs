//! Streaming Delta Parser
//!
//! Incrementally decodes a structured response (`{"message": ..., "actions": [...]}`)
//! while the model is still producing it, and hands back only the newly
//! available part of `message` on each push.
//!
//! The parser never fails. When the buffer cannot be decoded yet, a push simply
//! yields no delta and the caller keeps feeding text.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::partial_json::{LenientJsonDecoder, PartialJsonDecoder};

/// Matches an escape sequence cut off at the end of the buffer (`\u`, `\u0`, ... `\u00a`).
fn dangling_unicode_escape() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\\u[0-9a-fA-F]{0,3}$").ok())
        .as_ref()
}

/// Strip a trailing fragment that no decoder can complete on its own.
///
/// Returns `None` when there is nothing to strip.
fn strip_dangling_escape(text: &str) -> Option<&str> {
    if let Some(m) = dangling_unicode_escape().and_then(|re| re.find(text)) {
        return Some(&text[..m.start()]);
    }
    let trailing_backslashes = text.chars().rev().take_while(|c| *c == '\\').count();
    if trailing_backslashes % 2 == 1 {
        return Some(&text[..text.len() - 1]);
    }
    None
}

/// Incremental parser for a streamed `message` + `actions` object.
pub struct StreamingDeltaParser<D: PartialJsonDecoder = LenientJsonDecoder> {
    decoder: D,
    buffer: String,
    /// Characters of `message` already handed out as deltas
    emitted_chars: usize,
    message: String,
    actions: Vec<Value>,
}

impl StreamingDeltaParser<LenientJsonDecoder> {
    pub fn new() -> Self {
        Self::with_decoder(LenientJsonDecoder::new())
    }
}

impl Default for StreamingDeltaParser<LenientJsonDecoder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: PartialJsonDecoder> StreamingDeltaParser<D> {
    pub fn with_decoder(decoder: D) -> Self {
        Self {
            decoder,
            buffer: String::new(),
            emitted_chars: 0,
            message: String::new(),
            actions: Vec::new(),
        }
    }

    /// Append a chunk and return the new tail of `message`, if any.
    pub fn push(&mut self, chunk: &str) -> Option<String> {
        self.buffer.push_str(chunk);

        let decoded = self.decoder.decode(&self.buffer).or_else(|| {
            let stripped = strip_dangling_escape(&self.buffer)?;
            self.decoder.decode(stripped)
        })?;

        let object = decoded.as_object()?;

        if let Some(Value::Array(actions)) = object.get("actions") {
            self.actions = actions.clone();
        }

        let message = object.get("message").and_then(Value::as_str)?;
        let message_chars = message.chars().count();
        if message_chars <= self.emitted_chars {
            return None;
        }

        let delta: String = message.chars().skip(self.emitted_chars).collect();
        self.emitted_chars = message_chars;
        self.message = message.to_string();
        Some(delta)
    }

    /// Longest `message` decoded so far.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Most recently decoded `actions`.
    pub fn actions(&self) -> &[Value] {
        &self.actions
    }

    /// All text pushed so far.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }
}
