//! Choreo RCA Core
//!
//! Foundational types for the RCA remediation workspace. This crate has zero
//! dependencies on transport, rendering or configuration code.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `context` - Alert scope (`AlertScope`)
//! - `gateway` - Tool gateway abstraction and result decoding
//! - `streaming` - Patch and chat stream event types

pub mod context;
pub mod error;
pub mod gateway;
pub mod streaming;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Scope ──────────────────────────────────────────────────────────────
pub use context::AlertScope;

// ── Gateway ────────────────────────────────────────────────────────────
pub use gateway::{
    missing_tools, ContentBlock, GatewayConnector, GatewayCredentials, GatewayResult, ToolGateway,
};

// ── Streaming Types ────────────────────────────────────────────────────
pub use streaming::{ChatEvent, PatchEvent, PatchStatus};
