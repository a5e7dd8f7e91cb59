//! Remediation
//!
//! Turns reviewed remediation actions into `patch_release_binding` calls.
//!
//! - `field_path`: resource references, override field paths and document edits
//! - `bindings`: per-run release binding lookup
//! - `applier`: the streaming patch run

pub mod applier;
pub mod bindings;
pub mod field_path;

pub use applier::{
    plan_actions, PatchRunEnd, PatchSummary, PlanError, PlannedAction, PlannedChange,
    RemediationApplier, NO_REVISED_ACTIONS, RELEASE_BINDING_KIND,
};
pub use bindings::{build_binding_lookup, BindingInfo, BindingLookup};
pub use field_path::{
    apply_change, parse_field_path, parse_resource_ref, FieldPath, OverrideCategory, PatchError,
    PathSegment,
};
