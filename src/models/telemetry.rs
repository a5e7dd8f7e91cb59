//! Telemetry Models
//!
//! Typed views over the observability payloads returned by the tool gateway.
//! Every struct is lenient about missing fields and strict about wrong types,
//! so a malformed payload surfaces as a deserialization error the evidence
//! layer can fall back from.

use std::cmp::Ordering;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Label carrying the component UID of a log entry
pub const COMPONENT_UID_LABEL: &str = "openchoreo.dev/component-uid";
/// Label carrying the project UID of a log entry
pub const PROJECT_UID_LABEL: &str = "openchoreo.dev/project-uid";
/// Label carrying the environment UID of a log entry
pub const ENVIRONMENT_UID_LABEL: &str = "openchoreo.dev/environment-uid";

// ============================================================================
// Logs
// ============================================================================

/// One log line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub level: String,
    #[serde(default, alias = "log")]
    pub message: String,
    #[serde(default)]
    pub labels: Map<String, Value>,
}

impl LogEntry {
    /// String value of a label, if present.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).and_then(Value::as_str)
    }

    pub fn component_uid(&self) -> Option<&str> {
        self.label(COMPONENT_UID_LABEL)
    }

    pub fn project_uid(&self) -> Option<&str> {
        self.label(PROJECT_UID_LABEL)
    }

    pub fn environment_uid(&self) -> Option<&str> {
        self.label(ENVIRONMENT_UID_LABEL)
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// One sample of a metric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    #[serde(default)]
    pub time: Option<String>,
    pub value: f64,
}

/// A named, ordered metric series.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub name: String,
    pub points: Vec<MetricPoint>,
}

impl MetricSeries {
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn timestamps(&self) -> Vec<String> {
        self.points.iter().filter_map(|p| p.time.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ============================================================================
// Traces
// ============================================================================

/// One span of a distributed trace, as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub span_id: String,
    #[serde(default)]
    pub parent_span_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub start_time: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub end_time: String,
    #[serde(default, deserialize_with = "nanoseconds")]
    pub duration_nanoseconds: u64,
    #[serde(default)]
    pub open_choreo_component_uid: String,
    #[serde(default)]
    pub open_choreo_project_uid: String,
}

impl Span {
    /// Parent id, with an empty string treated as "no parent".
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_span_id.as_deref().filter(|p| !p.is_empty())
    }
}

/// A trace and its flat span list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub spans: Vec<Span>,
}

/// Order two span timestamps.
///
/// Numeric timestamps compare by value, anything else lexicographically
/// (RFC 3339 strings of equal precision sort chronologically that way).
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a timestamp string or number, got {}",
            other
        ))),
    }
}

fn nanoseconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration {}", n))),
        Value::Null => Ok(0),
        other => Err(serde::de::Error::custom(format!(
            "expected a duration in nanoseconds, got {}",
            other
        ))),
    }
}
