//! MCP Client
//!
//! JSON-RPC 2.0 client for the tool gateway, spoken over MCP's streamable
//! HTTP transport. Implements `ToolGateway` so remediation and evidence code
//! can call gateway operations without knowing about the wire protocol.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use choreo_rca_core::{
    CoreError, CoreResult, GatewayConnector, GatewayCredentials, GatewayResult, ToolGateway,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "mcp-session-id";

fn default_timeout_secs() -> u64 {
    30
}

/// Configuration for connecting to an MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Server name (for logs and error messages)
    pub name: String,
    /// Endpoint URL that accepts JSON-RPC POSTs
    pub url: String,
    /// Static headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Accept invalid TLS certificates
    #[serde(default)]
    pub tls_skip_verify: bool,
}

/// Information about a connected MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerInfo {
    /// Server name
    pub name: String,
    /// Protocol version
    pub protocol_version: String,
    /// Server capabilities
    pub capabilities: Value,
    /// Server-provided metadata
    pub server_info: Value,
}

/// Information about a tool provided by an MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolInfo {
    /// Tool name (as provided by the MCP server)
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON Schema for the tool's input parameters
    pub input_schema: Value,
}

/// JSON-RPC 2.0 request; notifications carry no id
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse {
    #[serde(default)]
    id: Option<u64>,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcResponse {
    /// The `result` member, or the JSON-RPC error turned into a gateway error.
    fn into_result(self, context: &str) -> CoreResult<Value> {
        if let Some(error) = self.error {
            return Err(CoreError::gateway(format!(
                "{} failed: [{}] {}",
                context, error.code, error.message
            )));
        }
        self.result
            .ok_or_else(|| CoreError::gateway(format!("{} returned no result", context)))
    }
}

/// HTTP transport state
struct HttpTransport {
    url: String,
    client: reqwest::Client,
    headers: HashMap<String, String>,
    session_id: Option<String>,
}

/// MCP client for one gateway session
pub struct McpClient {
    transport: HttpTransport,
    server_info: McpServerInfo,
    request_id: AtomicU64,
}

impl McpClient {
    /// Connect to an MCP server.
    ///
    /// Performs the MCP initialization handshake:
    /// 1. Send `initialize` request
    /// 2. Receive server capabilities (and a session id, if the server issues one)
    /// 3. Send `notifications/initialized` notification
    pub async fn connect(config: &McpServerConfig) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.tls_skip_verify)
            .build()
            .map_err(|e| CoreError::gateway(format!("Failed to create HTTP client: {}", e)))?;

        let mut transport = HttpTransport {
            url: config.url.clone(),
            client,
            headers: config.headers.clone(),
            session_id: None,
        };

        let request_id = AtomicU64::new(1);
        let server_info =
            Self::perform_init_handshake(&mut transport, &request_id, &config.name).await?;

        tracing::info!(
            "MCP connected: server={}, protocol={}",
            server_info.name,
            server_info.protocol_version
        );

        Ok(Self {
            transport,
            server_info,
            request_id,
        })
    }

    async fn perform_init_handshake(
        transport: &mut HttpTransport,
        request_id: &AtomicU64,
        name: &str,
    ) -> CoreResult<McpServerInfo> {
        let init_request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(request_id.fetch_add(1, Ordering::SeqCst)),
            method: "initialize".to_string(),
            params: Some(serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": "choreo-rca",
                    "version": env!("CARGO_PKG_VERSION")
                }
            })),
        };

        let (response, session_id) = Self::send_http_request(transport, &init_request).await?;
        transport.session_id = session_id;

        let result = response
            .ok_or_else(|| CoreError::gateway(format!("MCP server '{}' sent no initialize response", name)))?
            .into_result(&format!("MCP server '{}' initialization", name))?;

        let notification = JsonRpcRequest {
            jsonrpc: "2.0",
            id: None,
            method: "notifications/initialized".to_string(),
            params: None,
        };
        // Notifications don't require a response
        if let Err(e) = Self::send_http_request(transport, &notification).await {
            tracing::warn!("MCP server '{}' rejected initialized notification: {}", name, e);
        }

        Ok(McpServerInfo {
            name: name.to_string(),
            protocol_version: result
                .get("protocolVersion")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
            capabilities: result
                .get("capabilities")
                .cloned()
                .unwrap_or(Value::Object(serde_json::Map::new())),
            server_info: result
                .get("serverInfo")
                .cloned()
                .unwrap_or(Value::Object(serde_json::Map::new())),
        })
    }

    /// POST one JSON-RPC message.
    ///
    /// Returns the decoded response (absent for notifications) and the session
    /// id the server attached, if any.
    async fn send_http_request(
        transport: &HttpTransport,
        request: &JsonRpcRequest,
    ) -> CoreResult<(Option<JsonRpcResponse>, Option<String>)> {
        let mut req_builder = transport
            .client
            .post(&transport.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream");

        if let Some(session_id) = &transport.session_id {
            req_builder = req_builder.header(SESSION_HEADER, session_id);
        }
        for (key, value) in &transport.headers {
            req_builder = req_builder.header(key, value);
        }

        let body = serde_json::to_string(request)?;
        let response = req_builder
            .body(body)
            .send()
            .await
            .map_err(|e| CoreError::gateway(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(CoreError::gateway(format!(
                "MCP server returned HTTP {}: {}",
                status, text
            )));
        }

        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| transport.session_id.clone());

        let Some(id) = request.id else {
            return Ok((None, session_id));
        };

        let is_event_stream = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("text/event-stream"))
            .unwrap_or(false);

        let text = response
            .text()
            .await
            .map_err(|e| CoreError::gateway(format!("Failed to read response body: {}", e)))?;

        let parsed = if is_event_stream {
            parse_sse_response(&text, id)?
        } else {
            serde_json::from_str::<JsonRpcResponse>(&text).map_err(|e| {
                CoreError::gateway(format!("Failed to parse JSON-RPC response: {}", e))
            })?
        };

        Ok((Some(parsed), session_id))
    }

    async fn send_request(&self, method: &str, params: Option<Value>) -> CoreResult<Value> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(self.request_id.fetch_add(1, Ordering::SeqCst)),
            method: method.to_string(),
            params,
        };

        let (response, _) = Self::send_http_request(&self.transport, &request).await?;
        response
            .ok_or_else(|| CoreError::gateway(format!("{} returned no response", method)))?
            .into_result(method)
    }

    /// List all tools available on the connected MCP server
    pub async fn list_tool_infos(&self) -> CoreResult<Vec<McpToolInfo>> {
        let result = self.send_request("tools/list", None).await?;

        let tools = result
            .get("tools")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|tool_val| McpToolInfo {
                name: tool_val
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
                description: tool_val
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
                input_schema: tool_val
                    .get("inputSchema")
                    .cloned()
                    .unwrap_or(serde_json::json!({"type": "object"})),
            })
            .filter(|tool| !tool.name.is_empty())
            .collect();

        Ok(tools)
    }

    /// Call a tool on the connected MCP server
    pub async fn call_tool(&self, name: &str, args: Value) -> CoreResult<GatewayResult> {
        tracing::debug!("MCP tools/call: {}", name);
        let params = serde_json::json!({
            "name": name,
            "arguments": args,
        });

        let result = self.send_request("tools/call", Some(params)).await?;
        extract_tool_result(name, result)
    }

    /// Get server info
    pub fn server_info(&self) -> &McpServerInfo {
        &self.server_info
    }
}

/// Find the JSON-RPC response with the given id in a `text/event-stream` body.
pub(crate) fn parse_sse_response(body: &str, id: u64) -> CoreResult<JsonRpcResponse> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<JsonRpcResponse>(data.trim()).ok())
        .find(|response| response.id == Some(id))
        .ok_or_else(|| {
            CoreError::gateway(format!("No JSON-RPC response with id {} in event stream", id))
        })
}

/// Turn a `tools/call` result into a `GatewayResult`.
///
/// MCP returns `{ content: [{ type: "text", text: "..." }], isError? }`.
/// `isError` results become gateway errors carrying their text.
pub(crate) fn extract_tool_result(name: &str, result: Value) -> CoreResult<GatewayResult> {
    let content = result.get("content").cloned();

    if result.get("isError").and_then(Value::as_bool) == Some(true) {
        let text = content
            .as_ref()
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "no details".to_string());
        return Err(CoreError::gateway(format!(
            "MCP tool '{}' reported an error: {}",
            name, text
        )));
    }

    match content {
        Some(blocks @ Value::Array(_)) => GatewayResult::decode(blocks),
        _ => GatewayResult::decode(result),
    }
}

#[async_trait]
impl ToolGateway for McpClient {
    async fn list_tools(&self) -> CoreResult<Vec<String>> {
        Ok(self
            .list_tool_infos()
            .await?
            .into_iter()
            .map(|tool| tool.name)
            .collect())
    }

    async fn invoke(&self, tool_name: &str, args: Value) -> CoreResult<GatewayResult> {
        self.call_tool(tool_name, args).await
    }
}

/// Opens one authenticated MCP session per run.
pub struct McpConnector {
    config: McpServerConfig,
}

impl McpConnector {
    pub fn new(config: McpServerConfig) -> Self {
        Self { config }
    }

    /// Server config with the run's bearer token added to the static headers.
    fn authorized_config(&self, credentials: &GatewayCredentials) -> McpServerConfig {
        let mut config = self.config.clone();
        config.headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", credentials.bearer_token()),
        );
        config
    }
}

#[async_trait]
impl GatewayConnector for McpConnector {
    async fn connect(&self, credentials: &GatewayCredentials) -> CoreResult<Arc<dyn ToolGateway>> {
        let client = McpClient::connect(&self.authorized_config(credentials)).await?;
        Ok(Arc::new(client))
    }
}
