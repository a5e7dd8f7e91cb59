//! Release binding lookup
//!
//! Enumerates every component of the project and every release binding of
//! each component in the target environment, indexed by binding name.

use std::collections::HashMap;

use choreo_rca_core::{AlertScope, CoreError, CoreResult, GatewayResult, ToolGateway};
use choreo_rca_tools::catalogue;
use serde_json::{Map, Value};

use super::field_path::{OverrideCategory, PatchError};

/// A release binding and the component it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingInfo {
    pub component_name: String,
    pub release_name: String,
    /// Binding document as returned by the gateway
    pub raw: Map<String, Value>,
}

impl BindingInfo {
    /// Current override document for a category; an empty mapping when the
    /// binding has none. An override of any other shape cannot be edited.
    pub fn current_override(
        &self,
        category: OverrideCategory,
    ) -> Result<Map<String, Value>, PatchError> {
        match self.raw.get(category.field_name()) {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(Value::Object(doc)) => Ok(doc.clone()),
            Some(_) => Err(PatchError::IncompatibleDocument(
                category.field_name().to_string(),
            )),
        }
    }
}

/// Binding name -> binding info, scoped to one patch run.
pub type BindingLookup = HashMap<String, BindingInfo>;

/// Entries of `list_key` in a gateway result. A missing key is an empty list.
fn result_items(result: &GatewayResult, operation: &str, list_key: &str) -> CoreResult<Vec<Value>> {
    let content = result.require_mapping(operation)?;
    match content.get(list_key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err(CoreError::decode(format!(
            "'{}' in result of '{}' is not a list",
            list_key, operation
        ))),
    }
}

fn required_str<'a>(item: &'a Value, field: &str, operation: &str) -> CoreResult<&'a str> {
    item.get(field).and_then(Value::as_str).ok_or_else(|| {
        CoreError::decode(format!("entry in result of '{}' has no '{}'", operation, field))
    })
}

/// Resolve every release binding of the scope's project and environment.
///
/// Cost is one `list_components` call plus one `list_release_bindings` call
/// per component. Results are not paginated.
pub async fn build_binding_lookup(
    gateway: &dyn ToolGateway,
    scope: &AlertScope,
) -> CoreResult<BindingLookup> {
    let components = gateway
        .invoke(catalogue::LIST_COMPONENTS, Value::Object(scope.project_args()))
        .await?;
    let components = result_items(&components, catalogue::LIST_COMPONENTS, "components")?;

    let mut lookup = BindingLookup::new();
    for component in &components {
        let component_name = required_str(component, "name", catalogue::LIST_COMPONENTS)?;

        let bindings = gateway
            .invoke(
                catalogue::LIST_RELEASE_BINDINGS,
                Value::Object(scope.component_args(component_name)),
            )
            .await?;
        let bindings = result_items(&bindings, catalogue::LIST_RELEASE_BINDINGS, "bindings")?;

        for binding in bindings {
            let name = required_str(&binding, "name", catalogue::LIST_RELEASE_BINDINGS)?.to_string();
            let release_name =
                required_str(&binding, "releaseName", catalogue::LIST_RELEASE_BINDINGS)?.to_string();
            let raw = match binding {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            lookup.insert(
                name,
                BindingInfo {
                    component_name: component_name.to_string(),
                    release_name,
                    raw,
                },
            );
        }
    }

    tracing::debug!(
        "Resolved {} release bindings across {} components",
        lookup.len(),
        components.len()
    );
    Ok(lookup)
}
