//! Integration Tests Module
//!
//! End-to-end tests across the workspace crates: patch runs against a
//! recording gateway double, evidence digests of realistic tool results,
//! field path edits and chat stream assembly.


// Streaming patch protocol tests
mod patch_stream_test;

// Evidence transformer tests
mod evidence_test;


// Chat stream assembly tests
mod chat_stream_test;

// Config file and environment override tests
mod config_test;
