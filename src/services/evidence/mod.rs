//! Evidence Transformer
//!
//! Compresses raw observability tool results into compact Markdown digests
//! before they reach the reasoning loop.
//!
//! ## Architecture
//!
//! - `EvidenceKind`: which digest a tool's result gets, chosen by tool name
//! - `EvidenceTransformer`: decodes the gateway result and runs the digest
//! - `metrics`: `MetricsAnalyzer` statistics and the metrics digest
//! - `spans`: `SpanTreeBuilder` ordering for trace spans
//! - `logs` / `traces`: log and trace digests
//!
//! Digest failures never propagate. The transformer logs them and hands back
//! the payload re-serialized as JSON instead.

pub mod logs;
pub mod metrics;
pub mod spans;
pub mod traces;

use choreo_rca_core::GatewayResult;
use choreo_rca_tools::catalogue;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::settings::RcaConfig;

pub use metrics::{AnomalyReport, MetricStats, MetricsAnalyzer, MetricsReport, ResourcePressure};
pub use spans::{OrderedSpan, SpanTreeBuilder, SpanTreeError};
pub use traces::TraceDigest;

/// Internal digest failure. Never escapes `EvidenceTransformer`.
#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("span tree error: {0}")]
    SpanTree(#[from] SpanTreeError),
}

pub type EvidenceResult<T> = Result<T, EvidenceError>;

/// Digest strategy for a tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceKind {
    ComponentLogs,
    ProjectLogs,
    Metrics,
    Traces,
    /// Unknown tools: the payload is passed through as JSON
    Generic,
}

impl EvidenceKind {
    pub fn from_tool_name(tool_name: Option<&str>) -> Self {
        match tool_name {
            Some(catalogue::GET_COMPONENT_LOGS) => EvidenceKind::ComponentLogs,
            Some(catalogue::GET_PROJECT_LOGS) => EvidenceKind::ProjectLogs,
            Some(catalogue::GET_COMPONENT_RESOURCE_METRICS) => EvidenceKind::Metrics,
            Some(catalogue::GET_TRACES) => EvidenceKind::Traces,
            _ => EvidenceKind::Generic,
        }
    }
}

/// Turns tool results into evidence digests.
///
/// Built once at start-up and shared by reference.
#[derive(Debug, Clone, Default)]
pub struct EvidenceTransformer {
    analyzer: MetricsAnalyzer,
    span_builder: SpanTreeBuilder,
}

impl EvidenceTransformer {
    pub fn new(analyzer: MetricsAnalyzer, span_builder: SpanTreeBuilder) -> Self {
        Self {
            analyzer,
            span_builder,
        }
    }

    /// Transformer using the configured anomaly threshold.
    pub fn from_config(config: &RcaConfig) -> Self {
        Self::new(
            MetricsAnalyzer::new(config.anomaly_z_threshold),
            SpanTreeBuilder::default(),
        )
    }

    pub fn analyzer(&self) -> &MetricsAnalyzer {
        &self.analyzer
    }

    /// Digest a raw gateway result (mapping or content-block list).
    ///
    /// When no JSON object can be recovered from `raw`, it is passed through
    /// as JSON text unchanged.
    pub fn transform(&self, tool_name: Option<&str>, raw: &Value) -> String {
        let mapping = match GatewayResult::decode(raw.clone()) {
            Ok(result) => result.mapping(),
            Err(e) => {
                tracing::warn!("Undecodable result from {:?}: {}", tool_name, e);
                None
            }
        };

        match mapping {
            Some(content) => self.digest(EvidenceKind::from_tool_name(tool_name), &content),
            None => passthrough(raw),
        }
    }

    /// Digest an already decoded gateway result.
    pub fn transform_result(&self, tool_name: Option<&str>, result: &GatewayResult) -> String {
        match result.mapping() {
            Some(content) => self.digest(EvidenceKind::from_tool_name(tool_name), &content),
            None => passthrough(&result.to_value()),
        }
    }

    /// Run one digest strategy, falling back to the JSON payload on failure.
    pub fn digest(&self, kind: EvidenceKind, content: &Map<String, Value>) -> String {
        tracing::debug!("Building {:?} evidence digest", kind);
        let result = match kind {
            EvidenceKind::ComponentLogs => logs::component_digest(content),
            EvidenceKind::ProjectLogs => logs::project_digest(content),
            EvidenceKind::Metrics => self.analyzer.digest(content),
            EvidenceKind::Traces => traces::digest(&self.span_builder, content),
            EvidenceKind::Generic => Ok(passthrough_map(content)),
        };

        result.unwrap_or_else(|e| {
            tracing::error!("Error processing {:?} evidence: {}", kind, e);
            passthrough_map(content)
        })
    }
}

fn passthrough(value: &Value) -> String {
    value.to_string()
}

fn passthrough_map(content: &Map<String, Value>) -> String {
    // Serializing a Map<String, Value> cannot fail
    serde_json::to_string(content).unwrap_or_default()
}

/// Wrap digest text as a single MCP text block.
pub fn to_content_blocks(text: &str) -> Value {
    serde_json::json!([{ "type": "text", "text": text }])
}
