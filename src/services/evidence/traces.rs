//! Trace Digests
//!
//! Markdown digest of a `get_traces` result: one section per trace with its
//! spans laid out as nested headings.

use std::fmt::Write as _;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::spans::{OrderedSpan, SpanTreeBuilder};
use super::{EvidenceError, EvidenceResult};
use crate::models::telemetry::Trace;

pub const NO_TRACES: &str = "No traces found";

/// Deepest span that still gets its own heading level (`#######`)
const MAX_HEADING_DEPTH: usize = 3;

/// A trace ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceDigest {
    pub trace_id: String,
    pub ordered_spans: Vec<OrderedSpan>,
    pub total_spans: usize,
    pub total_duration_ms: f64,
}

/// Order a trace's spans and total its root durations.
///
/// Returns `Ok(None)` for a trace without spans.
pub fn digest_trace(builder: &SpanTreeBuilder, trace: &Trace) -> EvidenceResult<Option<TraceDigest>> {
    if trace.spans.is_empty() {
        return Ok(None);
    }
    let ordered_spans = builder.build(&trace.spans)?;
    let root_ns: u64 = ordered_spans
        .iter()
        .filter(|s| s.depth == 0)
        .map(|s| s.span.duration_nanoseconds)
        .sum();

    Ok(Some(TraceDigest {
        trace_id: trace.trace_id.clone(),
        total_spans: trace.spans.len(),
        total_duration_ms: root_ns as f64 / 1_000_000.0,
        ordered_spans,
    }))
}

fn write_span(out: &mut String, ordered: &OrderedSpan) {
    let span = &ordered.span;
    if ordered.depth > MAX_HEADING_DEPTH {
        out.push_str(&"  ".repeat(ordered.depth - MAX_HEADING_DEPTH));
        out.push_str("####");
    } else {
        out.push_str(&"#".repeat(ordered.depth + 4));
    }
    let _ = writeln!(out, " {}", span.name);

    let _ = writeln!(
        out,
        "- **Duration:** {:.2} ms ({} ns)",
        span.duration_nanoseconds as f64 / 1_000_000.0,
        span.duration_nanoseconds
    );
    match span.parent_id() {
        Some(parent) => {
            let _ = writeln!(
                out,
                "- **Span ID:** {} | **Parent Span ID:** {}",
                span.span_id, parent
            );
        }
        None => {
            let _ = writeln!(out, "- **Span ID:** {}", span.span_id);
        }
    }
    let _ = writeln!(out, "- **Time:** {} → {}", span.start_time, span.end_time);
    let _ = writeln!(out, "- **Component UID:** {}", span.open_choreo_component_uid);
    let _ = writeln!(out, "- **Project UID:** {}\n", span.open_choreo_project_uid);
}

/// Digest of a `get_traces` result.
pub fn digest(builder: &SpanTreeBuilder, content: &Map<String, Value>) -> EvidenceResult<String> {
    let traces = match content.get("traces") {
        None | Some(Value::Null) => Vec::new(),
        Some(raw @ Value::Array(_)) => Vec::<Trace>::deserialize(raw)?,
        Some(other) => {
            return Err(EvidenceError::InvalidShape(format!(
                "'traces' must be a list, got {}",
                other
            )))
        }
    };
    if traces.is_empty() {
        return Ok(NO_TRACES.to_string());
    }

    let took_ms = content.get("tookMs").and_then(Value::as_f64).unwrap_or(0.0);

    let mut out = String::from("## Distributed Traces\n\n");
    let _ = writeln!(out, "**Query Time:** {:.0} ms", took_ms);
    let _ = writeln!(out, "**Total Traces:** {}\n", traces.len());

    for trace in &traces {
        let Some(digest) = digest_trace(builder, trace)? else {
            continue;
        };
        let _ = writeln!(out, "### Trace ID: {}\n", digest.trace_id);
        let _ = writeln!(out, "**Total Spans:** {}", digest.total_spans);
        let _ = writeln!(out, "**Total Duration:** {:.2} ms\n", digest.total_duration_ms);
        for span in &digest.ordered_spans {
            write_span(&mut out, span);
        }
    }

    Ok(out)
}
