//! Remediation Models
//!
//! Recommended actions as produced by the analysis step, and the request a
//! caller submits to apply them.

use choreo_rca_core::AlertScope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Review state of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionStatus {
    Unchanged,
    Revised,
}

/// One change to a configuration resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    /// `"<Kind> <name>"`, e.g. `ReleaseBinding checkout-dev`
    pub resource: String,
    /// `spec.<overrideCategory>.<path...>`
    #[serde(alias = "fieldPath")]
    pub field_path: String,
    /// New leaf value, applied verbatim
    pub value: String,
}

/// A recommended remediation action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationAction {
    pub description: String,
    #[serde(default)]
    pub rationale: Option<String>,
    pub status: ActionStatus,
    #[serde(default)]
    pub changes: Vec<ResourceChange>,
}

impl RemediationAction {
    /// Whether the action should be dispatched at all.
    pub fn is_actionable(&self) -> bool {
        self.status == ActionStatus::Revised && !self.changes.is_empty()
    }
}

/// An action paired with the caller's index for it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedAction {
    pub index: usize,
    pub action: RemediationAction,
}

impl IndexedAction {
    /// Parse a raw action object; `index` defaults to `position`.
    pub fn from_raw(raw: &Value, position: usize) -> Result<Self, serde_json::Error> {
        let action = RemediationAction::deserialize(raw)?;
        let index = raw
            .get("index")
            .and_then(Value::as_u64)
            .map(|i| i as usize)
            .unwrap_or(position);
        Ok(Self { index, action })
    }
}

/// A patch request as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchRequest {
    #[serde(flatten)]
    pub scope: AlertScope,
    /// Raw action objects; kept raw so their `index` survives parsing
    pub actions: Vec<Value>,
}
