//! Log Digests
//!
//! Markdown digests for component-scoped and project-scoped log queries.

use std::fmt::Write as _;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{EvidenceError, EvidenceResult};
use crate::models::telemetry::LogEntry;

pub const NO_LOGS: &str = "No logs found";

fn read_logs(content: &Map<String, Value>) -> EvidenceResult<Vec<LogEntry>> {
    match content.get("logs") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(raw @ Value::Array(_)) => Ok(Vec::<LogEntry>::deserialize(raw)?),
        Some(other) => Err(EvidenceError::InvalidShape(format!(
            "'logs' must be a list, got {}",
            other
        ))),
    }
}

fn write_entry(out: &mut String, entry: &LogEntry) {
    let level = if entry.level.is_empty() {
        "UNKNOWN".to_string()
    } else {
        entry.level.to_uppercase()
    };
    let _ = writeln!(
        out,
        "- [{}] {} {}",
        entry.timestamp,
        level,
        entry.message.trim_end()
    );
}

/// Digest of a `get_component_logs` result.
///
/// Component, environment and project UIDs are taken from the first entry.
pub fn component_digest(content: &Map<String, Value>) -> EvidenceResult<String> {
    let logs = read_logs(content)?;
    let Some(first) = logs.first() else {
        return Ok(NO_LOGS.to_string());
    };

    let mut out = String::from("## Component Logs\n\n");
    let _ = writeln!(out, "**Component UID:** {}", first.component_uid().unwrap_or("N/A"));
    let _ = writeln!(
        out,
        "**Environment UID:** {}",
        first.environment_uid().unwrap_or("N/A")
    );
    let _ = writeln!(out, "**Project UID:** {}", first.project_uid().unwrap_or("N/A"));
    let _ = writeln!(out, "**Log Count:** {}\n", logs.len());

    for entry in &logs {
        write_entry(&mut out, entry);
    }
    Ok(out)
}

/// Digest of a `get_project_logs` result, grouped by component UID in
/// first-seen order.
pub fn project_digest(content: &Map<String, Value>) -> EvidenceResult<String> {
    let logs = read_logs(content)?;
    let Some(first) = logs.first() else {
        return Ok(NO_LOGS.to_string());
    };

    let mut groups: Vec<(&str, Vec<&LogEntry>)> = Vec::new();
    for entry in &logs {
        let uid = entry.component_uid().unwrap_or("unknown");
        match groups.iter_mut().find(|(key, _)| *key == uid) {
            Some((_, entries)) => entries.push(entry),
            None => groups.push((uid, vec![entry])),
        }
    }

    let mut out = String::from("## Project Logs\n\n");
    let _ = writeln!(out, "**Project UID:** {}", first.project_uid().unwrap_or("N/A"));
    let _ = writeln!(
        out,
        "**Environment UID:** {}\n",
        first.environment_uid().unwrap_or("N/A")
    );

    for (uid, entries) in &groups {
        let _ = writeln!(out, "### Component {}", uid);
        let _ = writeln!(out, "**Log Count:** {}\n", entries.len());
        for entry in entries {
            write_entry(&mut out, entry);
        }
        out.push('\n');
    }
    Ok(out)
}
