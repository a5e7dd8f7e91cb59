//! Choreo RCA Tools
//!
//! Gateway-facing pieces of the RCA remediation layer:
//! - `catalogue` - names of the gateway operations and their progress labels
//! - `mcp_client` - MCP JSON-RPC client implementing `ToolGateway`
//!
//! Everything that interprets tool results (evidence digests, patch runs)
//! lives in the main crate's `services` module.

pub mod catalogue;
pub mod mcp_client;

pub use catalogue::{active_forms, PATCH_TOOLS};
pub use mcp_client::{McpClient, McpConnector, McpServerConfig, McpServerInfo, McpToolInfo};
