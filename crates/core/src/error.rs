//! Core Error Types
//!
//! Defines the foundational error types shared by every crate in the RCA
//! remediation workspace. Only thiserror + std are used here so the core crate
//! stays lightweight.
//!
//! The root crate extends these with configuration errors in
//! `utils::error::AppError`.

use thiserror::Error;

/// Core error type for the RCA remediation workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Tool gateway transport or remote call errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A gateway result had a shape we cannot interpret
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a gateway error
    pub fn gateway(msg: impl Into<String>) -> Self {
        Self::Gateway(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
