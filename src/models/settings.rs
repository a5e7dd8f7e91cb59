//! Settings Models
//!
//! Process configuration for the RCA remediation layer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration stored in the JSON config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RcaConfig {
    /// MCP endpoint of the tool gateway
    pub mcp_server_url: String,
    /// Static headers sent with every gateway request
    pub mcp_headers: HashMap<String, String>,
    /// Per-request gateway timeout in seconds
    pub request_timeout_secs: u64,
    /// Accept invalid TLS certificates from the gateway
    pub tls_skip_verify: bool,
    /// |z| above which a metric point counts as a spike
    pub anomaly_z_threshold: f64,
    /// Fallback log filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for RcaConfig {
    fn default() -> Self {
        Self {
            mcp_server_url: "http://localhost:8080/mcp".to_string(),
            mcp_headers: HashMap::new(),
            request_timeout_secs: 30,
            tls_skip_verify: false,
            anomaly_z_threshold: 3.0,
            log_level: "info".to_string(),
        }
    }
}

impl RcaConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        let url = self.mcp_server_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!(
                "Invalid mcp_server_url: {}. Must start with http:// or https://",
                self.mcp_server_url
            ));
        }

        if !(1..=600).contains(&self.request_timeout_secs) {
            return Err(format!(
                "request_timeout_secs must be between 1 and 600, got {}",
                self.request_timeout_secs
            ));
        }

        if !(self.anomaly_z_threshold.is_finite() && self.anomaly_z_threshold > 0.0) {
            return Err(format!(
                "anomaly_z_threshold must be a positive number, got {}",
                self.anomaly_z_threshold
            ));
        }

        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level: {}. Must be one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        Ok(())
    }
}
