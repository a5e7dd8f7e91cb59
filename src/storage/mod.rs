//! Storage Layer
//!
//! Handles the JSON config file and its environment overrides.

pub mod config;

pub use config::*;
