//! Tool Catalogue
//!
//! Names of the gateway operations this layer knows about, and the
//! present-progressive labels shown while the model is calling them.

use std::collections::HashMap;

// Observability tools whose results are turned into evidence digests
pub const GET_COMPONENT_LOGS: &str = "get_component_logs";
pub const GET_PROJECT_LOGS: &str = "get_project_logs";
pub const GET_COMPONENT_RESOURCE_METRICS: &str = "get_component_resource_metrics";
pub const GET_TRACES: &str = "get_traces";

// Configuration-management tools used by remediation
pub const LIST_COMPONENTS: &str = "list_components";
pub const LIST_RELEASE_BINDINGS: &str = "list_release_bindings";
pub const PATCH_RELEASE_BINDING: &str = "patch_release_binding";

/// Every operation a patch run needs, in the order they are reported when missing.
pub const PATCH_TOOLS: [&str; 3] = [LIST_COMPONENTS, LIST_RELEASE_BINDINGS, PATCH_RELEASE_BINDING];

/// UI labels for tool calls streamed to the caller.
pub fn active_forms() -> HashMap<String, String> {
    [
        (GET_COMPONENT_LOGS, "Fetching component logs"),
        (GET_PROJECT_LOGS, "Fetching project logs"),
        (GET_COMPONENT_RESOURCE_METRICS, "Analyzing resource metrics"),
        (GET_TRACES, "Fetching traces"),
        (LIST_COMPONENTS, "Listing components"),
        (LIST_RELEASE_BINDINGS, "Listing release bindings"),
    ]
    .into_iter()
    .map(|(tool, label)| (tool.to_string(), label.to_string()))
    .collect()
}
