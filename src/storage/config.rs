//! JSON Configuration Management
//!
//! Resolves the process configuration once at start-up: config file, then
//! environment overrides, then validation.

use std::fs;
use std::path::{Path, PathBuf};

use choreo_rca_tools::McpServerConfig;

use crate::models::settings::RcaConfig;
use crate::utils::error::{AppError, AppResult};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "CHOREO_RCA_CONFIG";
/// Environment override for `mcp_server_url`
pub const MCP_URL_ENV: &str = "CHOREO_RCA_MCP_URL";
/// Environment override for `log_level`
pub const LOG_LEVEL_ENV: &str = "CHOREO_RCA_LOG_LEVEL";

/// Configuration service holding the resolved settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: Option<PathBuf>,
    config: RcaConfig,
}

impl ConfigService {
    /// Load configuration using the process environment.
    ///
    /// `path` wins over `$CHOREO_RCA_CONFIG`; with neither, defaults are used.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Load configuration with an explicit environment lookup.
    pub fn load_with_env<F>(path: Option<&Path>, env: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = path
            .map(Path::to_path_buf)
            .or_else(|| env(CONFIG_PATH_ENV).filter(|p| !p.is_empty()).map(PathBuf::from));

        let mut config = match &config_path {
            Some(path) => Self::load_from_file(path)?,
            None => RcaConfig::default(),
        };

        if let Some(url) = env(MCP_URL_ENV).filter(|v| !v.is_empty()) {
            config.mcp_server_url = url;
        }
        if let Some(level) = env(LOG_LEVEL_ENV).filter(|v| !v.is_empty()) {
            config.log_level = level.to_lowercase();
        }

        config.validate().map_err(AppError::validation)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<RcaConfig> {
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: RcaConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &RcaConfig {
        &self.config
    }

    /// File the configuration was read from, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Gateway connection settings derived from the configuration
    pub fn gateway_config(&self) -> McpServerConfig {
        McpServerConfig {
            name: "openchoreo".to_string(),
            url: self.config.mcp_server_url.clone(),
            headers: self.config.mcp_headers.clone(),
            timeout_secs: self.config.request_timeout_secs,
            tls_skip_verify: self.config.tls_skip_verify,
        }
    }
}
