//! Tool Gateway Abstraction
//!
//! Defines the seam between the remediation/evidence layer and the remote
//! tool gateway that executes named operations against telemetry and
//! configuration-management backends:
//!
//! - `ToolGateway` - list available operations, invoke one by name
//! - `GatewayConnector` - open a gateway session for one set of credentials
//! - `GatewayResult` - the decoded shape of an invocation result
//!
//! Gateway results arrive either as a direct JSON mapping or as a list of
//! typed content blocks. They are decoded once at the boundary into the
//! `GatewayResult` union so downstream code never has to duck-type raw JSON.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

// ============================================================================
// Result Decoding
// ============================================================================

/// One content block of a gateway result.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// `{"type": "text", "text": "..."}`
    Text(String),
    /// Any other block type, kept verbatim.
    Other(Value),
}

impl ContentBlock {
    fn decode(value: Value) -> CoreResult<Self> {
        let is_text = value.get("type").and_then(Value::as_str) == Some("text");
        if !is_text {
            if value.is_object() {
                return Ok(ContentBlock::Other(value));
            }
            return Err(CoreError::decode(format!(
                "content block must be an object, got {}",
                json_kind(&value)
            )));
        }

        match value.get("text") {
            Some(Value::String(text)) => Ok(ContentBlock::Text(text.clone())),
            _ => Ok(ContentBlock::Other(value)),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            ContentBlock::Text(text) => serde_json::json!({ "type": "text", "text": text }),
            ContentBlock::Other(value) => value.clone(),
        }
    }
}

/// Decoded result of a gateway invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayResult {
    /// The gateway answered with a JSON object directly.
    Mapping(Map<String, Value>),
    /// The gateway answered with a list of content blocks.
    Blocks(Vec<ContentBlock>),
}

impl GatewayResult {
    /// Decode a raw gateway result.
    ///
    /// Objects become `Mapping`, arrays become `Blocks`. Every other JSON
    /// shape is rejected with `CoreError::Decode`.
    pub fn decode(value: Value) -> CoreResult<Self> {
        match value {
            Value::Object(map) => Ok(GatewayResult::Mapping(map)),
            Value::Array(items) => items
                .into_iter()
                .map(ContentBlock::decode)
                .collect::<CoreResult<Vec<_>>>()
                .map(GatewayResult::Blocks),
            other => Err(CoreError::decode(format!(
                "expected a mapping or a list of content blocks, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Build a single-text-block result.
    pub fn text(text: impl Into<String>) -> Self {
        GatewayResult::Blocks(vec![ContentBlock::Text(text.into())])
    }

    /// Resolve the structured payload of this result.
    ///
    /// A direct mapping is returned as-is. For content blocks, the first text
    /// block whose text decodes to a JSON object is used. Returns `None` when
    /// no mapping can be recovered.
    pub fn mapping(&self) -> Option<Map<String, Value>> {
        match self {
            GatewayResult::Mapping(map) => Some(map.clone()),
            GatewayResult::Blocks(blocks) => blocks.iter().find_map(|block| match block {
                ContentBlock::Text(text) => match serde_json::from_str::<Value>(text) {
                    Ok(Value::Object(map)) => Some(map),
                    _ => None,
                },
                ContentBlock::Other(_) => None,
            }),
        }
    }

    /// Like `mapping`, but a missing mapping is an error.
    pub fn require_mapping(&self, operation: &str) -> CoreResult<Map<String, Value>> {
        self.mapping().ok_or_else(|| {
            CoreError::decode(format!("result of '{}' does not contain a JSON object", operation))
        })
    }

    /// Re-encode to the JSON shape it was decoded from.
    pub fn to_value(&self) -> Value {
        match self {
            GatewayResult::Mapping(map) => Value::Object(map.clone()),
            GatewayResult::Blocks(blocks) => {
                Value::Array(blocks.iter().map(ContentBlock::to_value).collect())
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Trait Definitions
// ============================================================================

/// A connected tool gateway session.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// Names of every operation this gateway currently exposes.
    async fn list_tools(&self) -> CoreResult<Vec<String>>;

    /// Invoke a named operation with a JSON object of arguments.
    async fn invoke(&self, tool_name: &str, args: Value) -> CoreResult<GatewayResult>;
}

/// Credentials presented to the gateway for one run.
#[derive(Clone)]
pub struct GatewayCredentials {
    bearer_token: String,
}

impl GatewayCredentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: token.into(),
        }
    }

    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }
}

impl fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("bearer_token", &"<redacted>")
            .finish()
    }
}

/// Opens gateway sessions.
///
/// Credentials are per request, so a connector is built once at process start
/// and asked for a fresh session by every run.
#[async_trait]
pub trait GatewayConnector: Send + Sync {
    async fn connect(&self, credentials: &GatewayCredentials) -> CoreResult<Arc<dyn ToolGateway>>;
}

/// Return the entries of `required` that `available` does not contain, in order.
pub fn missing_tools(available: &[String], required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|name| !available.iter().any(|a| a == *name))
        .map(|name| name.to_string())
        .collect()
}
