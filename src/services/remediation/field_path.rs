//! Field Path Engine
//!
//! Parses resource references (`ReleaseBinding checkout-dev`) and override
//! field paths (`spec.workloadOverrides.container.env[key=LOG_LEVEL].value`)
//! and applies a change to an override document.
//!
//! Grammar of a field path:
//!
//! ```text
//! path     := "spec" "." category ("." segment)+
//! category := "workloadOverrides" | "componentTypeEnvOverrides" | "traitOverrides"
//! segment  := word | word "[" word "=" value "]"
//! ```
//!
//! A selector segment finds (or creates) the list entry whose `key` equals
//! `value` and must be followed by at least one more segment.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Identifier fields tried when a selector's own key has no exact match
const FALLBACK_MATCH_KEYS: [&str; 2] = ["key", "name"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("Invalid resource reference: '{0}'. Expected 'Kind name'.")]
    MalformedReference(String),

    #[error(
        "Unsupported override category: '{0}'. Supported: workloadOverrides, componentTypeEnvOverrides, traitOverrides"
    )]
    UnsupportedOverrideCategory(String),

    #[error("Invalid field_path: '{0}'. Expected 'spec.<overrideCategory>.<path...>'.")]
    MalformedFieldPath(String),

    #[error("Array selector '{0}' cannot be the final segment; a field must follow it.")]
    ArraySelectorMustNotBeTerminal(String),

    #[error("Cannot descend into '{0}': the existing value has the wrong type.")]
    IncompatibleDocument(String),
}

/// Section of a binding's spec that remediation may modify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverrideCategory {
    WorkloadOverrides,
    ComponentTypeEnvOverrides,
    TraitOverrides,
}

impl OverrideCategory {
    pub const ALL: [OverrideCategory; 3] = [
        OverrideCategory::WorkloadOverrides,
        OverrideCategory::ComponentTypeEnvOverrides,
        OverrideCategory::TraitOverrides,
    ];

    /// Field name inside the binding document.
    pub fn field_name(&self) -> &'static str {
        match self {
            OverrideCategory::WorkloadOverrides => "workloadOverrides",
            OverrideCategory::ComponentTypeEnvOverrides => "componentTypeEnvOverrides",
            OverrideCategory::TraitOverrides => "traitOverrides",
        }
    }

    /// Argument name of the patch operation.
    pub fn param_name(&self) -> &'static str {
        match self {
            OverrideCategory::WorkloadOverrides => "workload_overrides",
            OverrideCategory::ComponentTypeEnvOverrides => "component_type_env_overrides",
            OverrideCategory::TraitOverrides => "trait_overrides",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.field_name() == name)
    }
}

/// One step of a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    ArraySelector {
        array_field: String,
        match_key: String,
        match_value: String,
    },
}

impl PathSegment {
    pub fn key(name: impl Into<String>) -> Self {
        PathSegment::Key(name.into())
    }

    pub fn selector(
        array_field: impl Into<String>,
        match_key: impl Into<String>,
        match_value: impl Into<String>,
    ) -> Self {
        PathSegment::ArraySelector {
            array_field: array_field.into(),
            match_key: match_key.into(),
            match_value: match_value.into(),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(name) => write!(f, "{}", name),
            PathSegment::ArraySelector {
                array_field,
                match_key,
                match_value,
            } => write!(f, "{}[{}={}]", array_field, match_key, match_value),
        }
    }
}

/// A parsed `spec.<category>.<segments...>` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    pub category: OverrideCategory,
    pub segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Reject paths that `apply_change` could never complete.
    pub fn ensure_applicable(&self) -> Result<(), PatchError> {
        match self.segments.last() {
            Some(last @ PathSegment::ArraySelector { .. }) => {
                Err(PatchError::ArraySelectorMustNotBeTerminal(last.to_string()))
            }
            _ => Ok(()),
        }
    }
}

fn selector_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\w+)\[(\w+)=([^\]]+)\]$").ok())
        .as_ref()
}

/// Split `"<Kind> <name>"` at the first whitespace run.
pub fn parse_resource_ref(reference: &str) -> Result<(String, String), PatchError> {
    let trimmed = reference.trim();
    let malformed = || PatchError::MalformedReference(reference.to_string());

    let (kind, name) = trimmed.split_once(char::is_whitespace).ok_or_else(malformed)?;
    let name = name.trim_start();
    if kind.is_empty() || name.is_empty() {
        return Err(malformed());
    }
    Ok((kind.to_string(), name.to_string()))
}

/// Parse an override field path.
pub fn parse_field_path(path: &str) -> Result<FieldPath, PatchError> {
    let malformed = || PatchError::MalformedFieldPath(path.to_string());

    let tokens: Vec<&str> = path.split('.').collect();
    if tokens.len() < 3 || tokens[0] != "spec" {
        return Err(malformed());
    }

    let category = OverrideCategory::from_field_name(tokens[1])
        .ok_or_else(|| PatchError::UnsupportedOverrideCategory(tokens[1].to_string()))?;

    let segments = tokens[2..]
        .iter()
        .map(|token| {
            if token.is_empty() {
                return Err(malformed());
            }
            if let Some(caps) = selector_pattern().and_then(|re| re.captures(token)) {
                return Ok(PathSegment::selector(&caps[1], &caps[2], &caps[3]));
            }
            if token.contains('[') || token.contains(']') {
                return Err(malformed());
            }
            Ok(PathSegment::key(*token))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FieldPath { category, segments })
}

/// Index of the list entry a selector refers to.
///
/// Tries `match_key` first, then the fallback identifier fields.
fn find_entry(items: &[Value], match_key: &str, match_value: &str) -> Option<usize> {
    let position_by = |key: &str| {
        items.iter().position(|item| {
            item.get(key).and_then(Value::as_str) == Some(match_value)
        })
    };

    position_by(match_key).or_else(|| {
        FALLBACK_MATCH_KEYS
            .iter()
            .filter(|alt| **alt != match_key)
            .find_map(|alt| position_by(alt))
    })
}

/// Set the leaf addressed by `segments` to `value`, creating intermediate
/// mappings and list entries as needed.
///
/// The leaf is always written as a JSON string.
pub fn apply_change(
    doc: &mut Map<String, Value>,
    segments: &[PathSegment],
    value: &str,
) -> Result<(), PatchError> {
    let mut current = doc;

    for (i, segment) in segments.iter().enumerate() {
        let is_last = i + 1 == segments.len();

        match segment {
            PathSegment::Key(name) => {
                if is_last {
                    current.insert(name.clone(), Value::String(value.to_string()));
                    return Ok(());
                }
                current = current
                    .entry(name.clone())
                    .or_insert_with(|| Value::Object(Map::new()))
                    .as_object_mut()
                    .ok_or_else(|| PatchError::IncompatibleDocument(segment.to_string()))?;
            }
            PathSegment::ArraySelector {
                array_field,
                match_key,
                match_value,
            } => {
                if is_last {
                    return Err(PatchError::ArraySelectorMustNotBeTerminal(segment.to_string()));
                }
                let items = current
                    .entry(array_field.clone())
                    .or_insert_with(|| Value::Array(Vec::new()))
                    .as_array_mut()
                    .ok_or_else(|| PatchError::IncompatibleDocument(segment.to_string()))?;

                let position = match find_entry(items, match_key, match_value) {
                    Some(position) => position,
                    None => {
                        let mut entry = Map::new();
                        entry.insert(match_key.clone(), Value::String(match_value.clone()));
                        items.push(Value::Object(entry));
                        items.len() - 1
                    }
                };
                current = items[position]
                    .as_object_mut()
                    .ok_or_else(|| PatchError::IncompatibleDocument(segment.to_string()))?;
            }
        }
    }

    Ok(())
}
