//! Evidence Transformer Integration Tests
//!
//! Feeds realistic gateway results (direct mappings and text content
//! blocks) through `EvidenceTransformer` and checks the digests.

use choreo_rca::services::evidence::{
    to_content_blocks, EvidenceTransformer, MetricsAnalyzer, SpanTreeBuilder,
};
use choreo_rca_core::GatewayResult;
use serde_json::{json, Value};

fn as_blocks(payload: Value) -> Value {
    json!([{"type": "text", "text": payload.to_string()}])
}

fn points(values: &[f64]) -> Value {
    Value::Array(
        values
            .iter()
            .enumerate()
            .map(|(i, v)| json!({"time": format!("2025-06-01T10:0{}:00Z", i), "value": v}))
            .collect(),
    )
}

// ============================================================================
// Metrics
// ============================================================================

#[test]
fn test_metrics_digest_from_content_blocks() {
    let payload = json!({
        "cpuUsage": points(&[0.10, 0.12, 0.11, 0.13]),
        "cpuRequests": points(&[0.10, 0.10, 0.10, 0.10]),
        "cpuLimits": points(&[0.50, 0.50, 0.50, 0.50]),
        "memory": points(&[200e6, 210e6, 205e6, 215e6]),
        "memoryLimits": points(&[256e6, 256e6, 256e6, 256e6])
    });

    let text = EvidenceTransformer::default()
        .transform(Some("get_component_resource_metrics"), &as_blocks(payload));

    assert!(text.starts_with("## Resource Metrics Analysis\n"));
    assert!(text.contains("Time Range: 2025-06-01T10:00:00Z to 2025-06-01T10:03:00Z"));
    assert!(text.contains("### CPU Metrics"));
    assert!(text.contains("### Memory Metrics"));
    assert!(text.contains("### Correlations"));
}

#[test]
fn test_metrics_without_known_series() {
    let text = EvidenceTransformer::default().transform(
        Some("get_component_resource_metrics"),
        &json!({"networkIn": points(&[1.0, 2.0])}),
    );
    assert_eq!(text, "No metrics data available");
}

#[test]
fn test_analyzer_properties() {
    let analyzer = MetricsAnalyzer::default();

    assert!(analyzer.stats(&[], &[]).is_none());
    let stats = analyzer.stats(&[1.0, 2.0, 3.0, 4.0], &[]).unwrap();
    assert_eq!(stats.mean, 2.5);

    for len in 2..6 {
        let report = analyzer.detect_anomalies(&vec![7.0; len]);
        assert_eq!(report.spike_count, 0);
        assert_eq!(report.max_spike_magnitude, 0.0);
    }
}

#[test]
fn test_pressure_uses_aligned_prefix() {
    let analyzer = MetricsAnalyzer::default();
    let pressure = analyzer
        .resource_pressure(&[1.0, 1.0, 9.0], &[2.0, 2.0], &[])
        .unwrap();
    assert!((pressure.avg_usage_to_request_ratio - 0.5).abs() < 1e-6);
    assert!(!pressure.exceeded_requests);
    assert!(analyzer.resource_pressure(&[], &[1.0], &[1.0]).is_none());
}

// ============================================================================
// Traces
// ============================================================================

#[test]
fn test_traces_digest_orders_spans() {
    let payload = json!({
        "tookMs": 8,
        "traces": [{
            "traceId": "abc123",
            "spans": [
                {"spanId": "B", "parentSpanId": "A", "name": "db.query", "startTime": "20",
                 "endTime": "30", "durationNanoseconds": 1000000},
                {"spanId": "A", "name": "GET /orders", "startTime": "10",
                 "endTime": "40", "durationNanoseconds": 3000000},
                {"spanId": "C", "parentSpanId": "A", "name": "cache.get", "startTime": "15",
                 "endTime": "16", "durationNanoseconds": 100000}
            ]
        }]
    });

    let text = EvidenceTransformer::default().transform(Some("get_traces"), &payload);

    assert!(text.contains("### Trace ID: abc123"));
    assert!(text.contains("**Total Spans:** 3"));
    assert!(text.contains("**Total Duration:** 3.00 ms"));
    let a = text.find("#### GET /orders").unwrap();
    let c = text.find("##### cache.get").unwrap();
    let b = text.find("##### db.query").unwrap();
    assert!(a < c && c < b);
}

#[test]
fn test_cyclic_trace_falls_back_to_json() {
    let payload = json!({
        "traces": [{
            "traceId": "t",
            "spans": [
                {"spanId": "A", "name": "a", "startTime": "1", "durationNanoseconds": 1},
                {"spanId": "B", "parentSpanId": "A", "name": "b", "startTime": "2", "durationNanoseconds": 1}
            ]
        }]
    });
    let transformer = EvidenceTransformer::new(MetricsAnalyzer::default(), SpanTreeBuilder::new(0));
    let text = transformer.transform(Some("get_traces"), &payload);
    assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), payload);
}

// ============================================================================
// Logs and Passthrough
// ============================================================================

#[test]
fn test_project_logs_digest() {
    let payload = json!({
        "logs": [
            {"timestamp": "t1", "level": "warn", "log": "slow query",
             "labels": {"openchoreo.dev/component-uid": "c-api", "openchoreo.dev/project-uid": "p-1"}},
            {"timestamp": "t2", "level": "error", "log": "timeout",
             "labels": {"openchoreo.dev/component-uid": "c-db", "openchoreo.dev/project-uid": "p-1"}}
        ]
    });
    let result = GatewayResult::decode(as_blocks(payload)).unwrap();
    let text = EvidenceTransformer::default().transform_result(Some("get_project_logs"), &result);

    assert!(text.starts_with("## Project Logs\n"));
    assert!(text.contains("**Project UID:** p-1"));
    assert!(text.contains("### Component c-api"));
    assert!(text.contains("- [t2] ERROR timeout"));
}

#[test]
fn test_unknown_tool_and_digest_wrapping() {
    let payload = json!({"bindings": [{"name": "api-dev"}]});
    let text = EvidenceTransformer::default().transform(Some("list_release_bindings"), &payload);
    assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), payload);

    let wrapped = to_content_blocks(&text);
    let decoded = GatewayResult::decode(wrapped).unwrap();
    assert_eq!(decoded.mapping().map(Value::Object), Some(payload));
}
