//! Remediation Applier
//!
//! Runs one patch request end to end and reports it as a `PatchEvent` stream:
//!
//! ```text
//! patch_started -> (patch_progress -> patch_result+)* -> patch_done
//! ```
//!
//! or a single `error` event when setup fails. Actions are applied strictly
//! one after another so every event is attributable to one action index.

use std::future::Future;
use std::sync::Arc;

use choreo_rca_core::{
    missing_tools, AlertScope, GatewayConnector, GatewayCredentials, PatchEvent, PatchStatus,
    ToolGateway,
};
use choreo_rca_tools::{catalogue, PATCH_TOOLS};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::Instrument;

use super::bindings::{build_binding_lookup, BindingInfo, BindingLookup};
use super::field_path::{
    apply_change, parse_field_path, parse_resource_ref, FieldPath, OverrideCategory, PatchError,
};
use crate::models::remediation::{IndexedAction, ResourceChange};

/// The only resource kind a patch run can modify
pub const RELEASE_BINDING_KIND: &str = "ReleaseBinding";

pub const NO_REVISED_ACTIONS: &str = "No revised actions to apply";

// ============================================================================
// Planning
// ============================================================================

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("action {position}: {source}")]
    Action {
        position: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("action {index}: {source}")]
    Change {
        index: usize,
        #[source]
        source: PatchError,
    },
}

/// A single validated change.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedChange {
    /// Targets a kind that cannot be patched; reported as skipped
    Unsupported { kind: String },
    Binding {
        binding_name: String,
        path: FieldPath,
        value: String,
    },
}

/// An actionable remediation, validated and ready to dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAction {
    pub index: usize,
    pub description: String,
    pub changes: Vec<PlannedChange>,
}

fn plan_change(change: &ResourceChange) -> Result<PlannedChange, PatchError> {
    let (kind, name) = parse_resource_ref(&change.resource)?;
    if kind != RELEASE_BINDING_KIND {
        return Ok(PlannedChange::Unsupported { kind });
    }
    let path = parse_field_path(&change.field_path)?;
    path.ensure_applicable()?;
    Ok(PlannedChange::Binding {
        binding_name: name,
        path,
        value: change.value.clone(),
    })
}

/// Parse raw actions, keep the actionable ones and validate their changes.
///
/// Actions that are `UNCHANGED`, or `REVISED` without changes, are dropped.
pub fn plan_actions(raw_actions: &[Value]) -> Result<Vec<PlannedAction>, PlanError> {
    let mut planned = Vec::new();
    for (position, raw) in raw_actions.iter().enumerate() {
        let IndexedAction { index, action } = IndexedAction::from_raw(raw, position)
            .map_err(|source| PlanError::Action { position, source })?;
        if !action.is_actionable() {
            continue;
        }

        let changes = action
            .changes
            .iter()
            .map(plan_change)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| PlanError::Change { index, source })?;

        planned.push(PlannedAction {
            index,
            description: action.description,
            changes,
        });
    }
    Ok(planned)
}

/// Build `patch_release_binding` arguments for one binding.
///
/// Each touched override category is seeded once from the binding's current
/// document and receives its edits in input order.
pub fn build_patch_args(
    scope: &AlertScope,
    binding_name: &str,
    info: &BindingInfo,
    edits: &[(&FieldPath, &str)],
) -> Result<Map<String, Value>, PatchError> {
    let mut overrides: Vec<(OverrideCategory, Map<String, Value>)> = Vec::new();
    for (path, value) in edits {
        let position = match overrides.iter().position(|(c, _)| *c == path.category) {
            Some(position) => position,
            None => {
                overrides.push((path.category, info.current_override(path.category)?));
                overrides.len() - 1
            }
        };
        apply_change(&mut overrides[position].1, &path.segments, value)?;
    }

    let mut args = Map::new();
    args.insert("namespace_name".into(), Value::String(scope.namespace_name.clone()));
    args.insert("project_name".into(), Value::String(scope.project_name.clone()));
    args.insert("environment".into(), Value::String(scope.environment_name.clone()));
    args.insert("component_name".into(), Value::String(info.component_name.clone()));
    args.insert("binding_name".into(), Value::String(binding_name.to_string()));
    args.insert("release_name".into(), Value::String(info.release_name.clone()));
    for (category, doc) in overrides {
        args.insert(category.param_name().into(), Value::Object(doc));
    }
    Ok(args)
}

// ============================================================================
// Event Sink
// ============================================================================

/// The caller dropped the event receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cancelled;

struct EventSink {
    tx: mpsc::Sender<PatchEvent>,
}

impl EventSink {
    async fn emit(&self, event: PatchEvent) -> Result<(), Cancelled> {
        self.tx.send(event).await.map_err(|_| Cancelled)
    }

    /// Drive `fut` unless the receiver goes away first.
    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        tokio::select! {
            output = fut => Ok(output),
            _ = self.tx.closed() => Err(Cancelled),
        }
    }
}

// ============================================================================
// Applier
// ============================================================================

/// Counts reported by `patch_done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatchSummary {
    /// Actions where every binding group was applied
    pub success_count: usize,
    /// Actionable actions in the request
    pub total: usize,
}

impl PatchSummary {
    pub fn summary_line(&self) -> String {
        format!("Applied {}/{} fixes", self.success_count, self.total)
    }
}

/// How a patch run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchRunEnd {
    /// `patch_done` was emitted
    Completed(PatchSummary),
    /// Setup failed; the error event carried this message
    Aborted(String),
    /// The receiver was dropped mid-run
    Cancelled,
}

/// Applies remediation actions through the tool gateway.
#[derive(Clone)]
pub struct RemediationApplier {
    connector: Arc<dyn GatewayConnector>,
}

fn new_request_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("patch_{}", &hex[..12])
}

impl RemediationApplier {
    pub fn new(connector: Arc<dyn GatewayConnector>) -> Self {
        Self { connector }
    }

    /// Apply `raw_actions` within `scope`, sending every event to `events`.
    ///
    /// Dropping the receiver cancels the run: in-flight gateway calls are
    /// abandoned and no further patches are issued.
    pub async fn stream_patch(
        &self,
        raw_actions: &[Value],
        scope: &AlertScope,
        credentials: &GatewayCredentials,
        events: mpsc::Sender<PatchEvent>,
    ) -> PatchRunEnd {
        let request_id = new_request_id();
        let span = tracing::info_span!("patch", request_id = %request_id);
        let sink = EventSink { tx: events };

        match self
            .run(raw_actions, scope, credentials, &sink)
            .instrument(span)
            .await
        {
            Ok(end) => end,
            Err(Cancelled) => {
                tracing::info!("Patch run {} cancelled by caller", request_id);
                PatchRunEnd::Cancelled
            }
        }
    }

    async fn abort(&self, sink: &EventSink, message: String) -> Result<PatchRunEnd, Cancelled> {
        tracing::error!("Patch run aborted: {}", message);
        sink.emit(PatchEvent::error(message.clone())).await?;
        Ok(PatchRunEnd::Aborted(message))
    }

    async fn run(
        &self,
        raw_actions: &[Value],
        scope: &AlertScope,
        credentials: &GatewayCredentials,
        sink: &EventSink,
    ) -> Result<PatchRunEnd, Cancelled> {
        let actions = match plan_actions(raw_actions) {
            Ok(actions) => actions,
            Err(e) => return self.abort(sink, format!("Invalid patch actions: {}", e)).await,
        };

        if actions.is_empty() {
            sink.emit(PatchEvent::PatchStarted).await?;
            sink.emit(PatchEvent::PatchDone {
                summary: NO_REVISED_ACTIONS.to_string(),
            })
            .await?;
            return Ok(PatchRunEnd::Completed(PatchSummary::default()));
        }

        let gateway = match sink.guard(self.connector.connect(credentials)).await? {
            Ok(gateway) => gateway,
            Err(e) => {
                return self
                    .abort(sink, format!("Failed to connect to MCP server: {}", e))
                    .await
            }
        };
        let available = match sink.guard(gateway.list_tools()).await? {
            Ok(tools) => tools,
            Err(e) => {
                return self
                    .abort(sink, format!("Failed to connect to MCP server: {}", e))
                    .await
            }
        };
        let missing = missing_tools(&available, &PATCH_TOOLS);
        if !missing.is_empty() {
            return self
                .abort(
                    sink,
                    format!("Required MCP tools not available: {}", missing.join(", ")),
                )
                .await;
        }

        let lookup = match sink.guard(build_binding_lookup(gateway.as_ref(), scope)).await? {
            Ok(lookup) => lookup,
            Err(e) => {
                return self
                    .abort(sink, format!("Failed to resolve release bindings: {}", e))
                    .await
            }
        };

        sink.emit(PatchEvent::PatchStarted).await?;
        tracing::info!(
            "Applying {} actions in {}/{}/{}",
            actions.len(),
            scope.namespace_name,
            scope.project_name,
            scope.environment_name
        );

        let mut summary = PatchSummary {
            success_count: 0,
            total: actions.len(),
        };
        for action in &actions {
            if self
                .apply_action(gateway.as_ref(), &lookup, scope, action, sink)
                .await?
            {
                summary.success_count += 1;
            }
        }

        sink.emit(PatchEvent::PatchDone {
            summary: summary.summary_line(),
        })
        .await?;
        Ok(PatchRunEnd::Completed(summary))
    }

    /// Apply one action. Returns whether it fully succeeded.
    async fn apply_action(
        &self,
        gateway: &dyn ToolGateway,
        lookup: &BindingLookup,
        scope: &AlertScope,
        action: &PlannedAction,
        sink: &EventSink,
    ) -> Result<bool, Cancelled> {
        let index = action.index;
        let description = action.description.as_str();
        sink.emit(PatchEvent::progress(index, description)).await?;

        // binding name -> edits, in first-seen order
        let mut groups: Vec<(&str, Vec<(&FieldPath, &str)>)> = Vec::new();
        for change in &action.changes {
            match change {
                PlannedChange::Unsupported { kind } => {
                    sink.emit(PatchEvent::result(
                        index,
                        description,
                        PatchStatus::Skipped,
                        format!("Unsupported resource kind: '{}'", kind),
                    ))
                    .await?;
                }
                PlannedChange::Binding {
                    binding_name,
                    path,
                    value,
                } => {
                    let edit = (path, value.as_str());
                    match groups.iter_mut().find(|(name, _)| *name == binding_name.as_str()) {
                        Some((_, edits)) => edits.push(edit),
                        None => groups.push((binding_name.as_str(), vec![edit])),
                    }
                }
            }
        }

        let mut applied = 0;
        let mut failed = false;
        for (binding_name, edits) in &groups {
            let Some(info) = lookup.get(*binding_name) else {
                tracing::warn!("No release binding named '{}' in scope", binding_name);
                sink.emit(PatchEvent::result(
                    index,
                    description,
                    PatchStatus::Failed,
                    format!("No component found for release binding '{}'", binding_name),
                ))
                .await?;
                failed = true;
                continue;
            };

            match self
                .patch_binding(gateway, scope, binding_name, info, edits, sink)
                .await?
            {
                Ok(()) => {
                    sink.emit(PatchEvent::result(
                        index,
                        description,
                        PatchStatus::Success,
                        format!("Applied to {} {}", RELEASE_BINDING_KIND, binding_name),
                    ))
                    .await?;
                    applied += 1;
                }
                Err(cause) => {
                    tracing::error!("Failed to apply action '{}': {}", description, cause);
                    sink.emit(PatchEvent::result(
                        index,
                        description,
                        PatchStatus::Failed,
                        cause,
                    ))
                    .await?;
                    failed = true;
                    break;
                }
            }
        }

        Ok(applied > 0 && !failed)
    }

    async fn patch_binding(
        &self,
        gateway: &dyn ToolGateway,
        scope: &AlertScope,
        binding_name: &str,
        info: &BindingInfo,
        edits: &[(&FieldPath, &str)],
        sink: &EventSink,
    ) -> Result<Result<(), String>, Cancelled> {
        let args = match build_patch_args(scope, binding_name, info, edits) {
            Ok(args) => args,
            Err(e) => return Ok(Err(e.to_string())),
        };

        if sink.tx.is_closed() {
            return Err(Cancelled);
        }
        let args = Value::Object(args);
        tracing::debug!("patch_release_binding args: {}", args);
        let outcome = sink
            .guard(gateway.invoke(catalogue::PATCH_RELEASE_BINDING, args))
            .await?;
        Ok(outcome.map(|_| ()).map_err(|e| e.to_string()))
    }
}
