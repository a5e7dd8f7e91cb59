//! Alert Scope
//!
//! The namespace / project / environment triple that a remediation run or an
//! evidence query is resolved against.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Resolved scope of an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertScope {
    pub namespace_name: String,
    pub project_name: String,
    pub environment_name: String,
}

impl AlertScope {
    pub fn new(
        namespace_name: impl Into<String>,
        project_name: impl Into<String>,
        environment_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace_name: namespace_name.into(),
            project_name: project_name.into(),
            environment_name: environment_name.into(),
        }
    }

    /// Gateway arguments naming the namespace and project.
    pub fn project_args(&self) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("namespace_name".into(), Value::String(self.namespace_name.clone()));
        args.insert("project_name".into(), Value::String(self.project_name.clone()));
        args
    }

    /// Gateway arguments naming namespace, project, environment and component.
    pub fn component_args(&self, component_name: &str) -> Map<String, Value> {
        let mut args = self.project_args();
        args.insert(
            "environment_name".into(),
            Value::String(self.environment_name.clone()),
        );
        args.insert("component_name".into(), Value::String(component_name.to_string()));
        args
    }
}
