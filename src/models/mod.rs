//! Data Models
//!
//! Contains the data structures shared by the evidence and remediation services.

pub mod remediation;
pub mod settings;
pub mod telemetry;

pub use remediation::*;
pub use settings::*;
pub use telemetry::*;
