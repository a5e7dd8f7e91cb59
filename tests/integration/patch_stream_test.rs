//! Patch Stream Integration Tests
//!
//! Drives `RemediationApplier` against `MockGateway` and checks the exact
//! event sequence plus the arguments of every patch call.

use std::sync::Arc;

use choreo_rca::services::remediation::{PatchRunEnd, PatchSummary, RemediationApplier};
use choreo_rca_core::{GatewayCredentials, PatchEvent, PatchStatus};
use serde_json::json;
use tokio::sync::mpsc;

use super::support::{change, revised, run_patch, scope, MockConnector, MockGateway};

fn api_binding() -> serde_json::Value {
    json!({
        "name": "api-dev",
        "releaseName": "api-r7",
        "workloadOverrides": {
            "container": {
                "env": [
                    {"key": "LOG_LEVEL", "value": "info"},
                    {"name": "POSTGRES_DSN", "value": "postgres://old"}
                ]
            }
        }
    })
}

fn connector() -> Arc<MockConnector> {
    Arc::new(MockConnector::new(
        MockGateway::new()
            .with_binding("api", api_binding())
            .with_binding("worker", json!({"name": "worker-dev", "releaseName": "worker-r2"})),
    ))
}

fn completed(success_count: usize, total: usize) -> PatchRunEnd {
    PatchRunEnd::Completed(PatchSummary {
        success_count,
        total,
    })
}

// ============================================================================
// Happy Path
// ============================================================================

#[tokio::test]
async fn test_single_change_applies_and_reports_success() {
    let connector = connector();
    let actions = vec![revised(
        "Raise memory limit",
        vec![change(
            "ReleaseBinding api-dev",
            "spec.workloadOverrides.container.resources.limits.memory",
            "512Mi",
        )],
    )];

    let (end, events) = run_patch(connector.clone(), actions).await;

    assert_eq!(
        events,
        vec![
            PatchEvent::PatchStarted,
            PatchEvent::progress(0, "Raise memory limit"),
            PatchEvent::result(
                0,
                "Raise memory limit",
                PatchStatus::Success,
                "Applied to ReleaseBinding api-dev"
            ),
            PatchEvent::PatchDone {
                summary: "Applied 1/1 fixes".to_string()
            },
        ]
    );
    assert_eq!(end, completed(1, 1));

    let patches = connector.gateway.patch_calls();
    assert_eq!(patches.len(), 1);
    let args = &patches[0];
    assert_eq!(args["namespace_name"], "default");
    assert_eq!(args["project_name"], "shop");
    assert_eq!(args["environment"], "development");
    assert_eq!(args["component_name"], "api");
    assert_eq!(args["binding_name"], "api-dev");
    assert_eq!(args["release_name"], "api-r7");
    // existing overrides are carried over alongside the new leaf
    assert_eq!(
        args["workload_overrides"]["container"]["env"][0],
        json!({"key": "LOG_LEVEL", "value": "info"})
    );
    assert_eq!(
        args["workload_overrides"]["container"]["resources"]["limits"]["memory"],
        "512Mi"
    );
    assert!(args.get("trait_overrides").is_none());
}

#[tokio::test]
async fn test_selector_falls_back_to_name_field() {
    let connector = connector();
    let actions = vec![revised(
        "Point at the replica",
        vec![change(
            "ReleaseBinding api-dev",
            "spec.workloadOverrides.container.env[key=POSTGRES_DSN].value",
            "postgres://replica",
        )],
    )];

    let (end, _) = run_patch(connector.clone(), actions).await;
    assert_eq!(end, completed(1, 1));

    let env = &connector.gateway.patch_calls()[0]["workload_overrides"]["container"]["env"];
    assert_eq!(env.as_array().unwrap().len(), 2);
    assert_eq!(env[1], json!({"name": "POSTGRES_DSN", "value": "postgres://replica"}));
}

#[tokio::test]
async fn test_changes_to_one_binding_share_one_patch_call() {
    let connector = connector();
    let actions = vec![revised(
        "Tune logging",
        vec![
            change(
                "ReleaseBinding api-dev",
                "spec.workloadOverrides.container.env[key=LOG_LEVEL].value",
                "debug",
            ),
            change(
                "ReleaseBinding api-dev",
                "spec.traitOverrides.autoscaler.maxReplicas",
                "4",
            ),
            change(
                "ReleaseBinding api-dev",
                "spec.workloadOverrides.container.env[key=LOG_LEVEL].value",
                "warn",
            ),
        ],
    )];

    let (end, events) = run_patch(connector.clone(), actions).await;
    assert_eq!(end, completed(1, 1));
    assert_eq!(events.len(), 4);

    let patches = connector.gateway.patch_calls();
    assert_eq!(patches.len(), 1);
    assert_eq!(
        patches[0]["workload_overrides"]["container"]["env"][0]["value"],
        "warn"
    );
    assert_eq!(
        patches[0]["trait_overrides"],
        json!({"autoscaler": {"maxReplicas": "4"}})
    );
}

#[tokio::test]
async fn test_caller_indices_are_preserved() {
    let connector = connector();
    let mut first = revised(
        "First",
        vec![change("ReleaseBinding api-dev", "spec.traitOverrides.a", "1")],
    );
    first["index"] = json!(5);
    let actions = vec![
        json!({"description": "Untouched", "status": "UNCHANGED"}),
        first,
        revised(
            "Second",
            vec![change("ReleaseBinding worker-dev", "spec.traitOverrides.b", "2")],
        ),
    ];

    let (end, events) = run_patch(connector, actions).await;
    assert_eq!(end, completed(2, 2));

    let indices: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            PatchEvent::PatchProgress { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(indices, vec![5, 2]);
}

// ============================================================================
// Per-action Failures
// ============================================================================

#[tokio::test]
async fn test_missing_binding_fails_action_and_continues() {
    let connector = connector();
    let actions = vec![revised(
        "Fix ghost",
        vec![change("ReleaseBinding ghost-dev", "spec.traitOverrides.x", "1")],
    )];

    let (end, events) = run_patch(connector.clone(), actions).await;

    assert_eq!(events.len(), 4);
    assert_eq!(events[0], PatchEvent::PatchStarted);
    assert_eq!(events[1], PatchEvent::progress(0, "Fix ghost"));
    match &events[2] {
        PatchEvent::PatchResult {
            status, details, ..
        } => {
            assert_eq!(*status, PatchStatus::Failed);
            assert!(details.contains("ghost-dev"));
        }
        other => panic!("expected patch_result, got {:?}", other),
    }
    assert_eq!(
        events[3],
        PatchEvent::PatchDone {
            summary: "Applied 0/1 fixes".to_string()
        }
    );
    assert_eq!(end, completed(0, 1));
    assert!(connector.gateway.patch_calls().is_empty());
}

#[tokio::test]
async fn test_unsupported_kind_is_skipped_without_aborting_siblings() {
    let connector = connector();
    let actions = vec![revised(
        "Scale out",
        vec![
            change("Deployment api", "spec.replicas", "3"),
            change("ReleaseBinding api-dev", "spec.traitOverrides.hpa.min", "2"),
        ],
    )];

    let (end, events) = run_patch(connector.clone(), actions).await;

    assert_eq!(
        events[2],
        PatchEvent::result(
            0,
            "Scale out",
            PatchStatus::Skipped,
            "Unsupported resource kind: 'Deployment'"
        )
    );
    assert_eq!(
        events[3],
        PatchEvent::result(
            0,
            "Scale out",
            PatchStatus::Success,
            "Applied to ReleaseBinding api-dev"
        )
    );
    assert_eq!(end, completed(1, 1));
    assert_eq!(connector.gateway.patch_calls().len(), 1);
}

#[tokio::test]
async fn test_only_unsupported_kinds_do_not_count_as_success() {
    let connector = connector();
    let actions = vec![revised(
        "Scale out",
        vec![change("Deployment api", "spec.replicas", "3")],
    )];

    let (end, events) = run_patch(connector, actions).await;
    assert_eq!(events.len(), 4);
    assert_eq!(end, completed(0, 1));
}

#[tokio::test]
async fn test_gateway_failure_is_reported_and_next_action_runs() {
    let connector = Arc::new(MockConnector::new(
        MockGateway::new()
            .with_binding("api", api_binding())
            .with_binding("worker", json!({"name": "worker-dev", "releaseName": "worker-r2"}))
            .failing_patch("api-dev", "admission webhook denied"),
    ));
    let actions = vec![
        revised(
            "Break",
            vec![change("ReleaseBinding api-dev", "spec.traitOverrides.x", "1")],
        ),
        revised(
            "Fix",
            vec![change("ReleaseBinding worker-dev", "spec.traitOverrides.y", "2")],
        ),
    ];

    let (end, events) = run_patch(connector.clone(), actions).await;

    match &events[2] {
        PatchEvent::PatchResult {
            index,
            status,
            details,
            ..
        } => {
            assert_eq!(*index, 0);
            assert_eq!(*status, PatchStatus::Failed);
            assert!(details.contains("admission webhook denied"));
        }
        other => panic!("expected patch_result, got {:?}", other),
    }
    assert_eq!(events[3], PatchEvent::progress(1, "Fix"));
    assert_eq!(
        events.last(),
        Some(&PatchEvent::PatchDone {
            summary: "Applied 1/2 fixes".to_string()
        })
    );
    assert_eq!(end, completed(1, 2));
    // no retry of the failed call
    assert_eq!(connector.gateway.patch_calls().len(), 2);
}

#[tokio::test]
async fn test_incompatible_document_fails_action() {
    let connector = Arc::new(MockConnector::new(MockGateway::new().with_binding(
        "api",
        json!({"name": "api-dev", "releaseName": "r1", "traitOverrides": {"hpa": "off"}}),
    )));
    let actions = vec![revised(
        "Raise ceiling",
        vec![change("ReleaseBinding api-dev", "spec.traitOverrides.hpa.max", "5")],
    )];

    let (end, events) = run_patch(connector.clone(), actions).await;
    assert!(matches!(
        &events[2],
        PatchEvent::PatchResult { status: PatchStatus::Failed, .. }
    ));
    assert_eq!(end, completed(0, 1));
    assert!(connector.gateway.patch_calls().is_empty());
}

#[tokio::test]
async fn test_non_mapping_override_is_not_replaced() {
    let connector = Arc::new(MockConnector::new(MockGateway::new().with_binding(
        "api",
        json!({
            "name": "api-dev",
            "releaseName": "r1",
            "workloadOverrides": [{"container": {"image": "x"}}]
        }),
    )));
    let actions = vec![revised(
        "Scale out",
        vec![change("ReleaseBinding api-dev", "spec.workloadOverrides.replicas", "3")],
    )];

    let (end, events) = run_patch(connector.clone(), actions).await;
    assert!(matches!(
        &events[2],
        PatchEvent::PatchResult { status: PatchStatus::Failed, .. }
    ));
    assert_eq!(end, completed(0, 1));
    assert!(connector.gateway.patch_calls().is_empty());
}

#[tokio::test]
async fn test_success_count_never_exceeds_total() {
    let connector = connector();
    let actions = vec![
        revised(
            "Two bindings",
            vec![
                change("ReleaseBinding api-dev", "spec.traitOverrides.a", "1"),
                change("ReleaseBinding worker-dev", "spec.traitOverrides.b", "2"),
            ],
        ),
        revised(
            "Mixed",
            vec![
                change("ReleaseBinding worker-dev", "spec.traitOverrides.c", "3"),
                change("ReleaseBinding ghost", "spec.traitOverrides.d", "4"),
            ],
        ),
    ];

    let (end, events) = run_patch(connector.clone(), actions).await;
    let PatchRunEnd::Completed(summary) = end else {
        panic!("run did not complete");
    };
    assert!(summary.success_count <= summary.total);
    assert_eq!(summary, PatchSummary { success_count: 1, total: 2 });
    assert_eq!(connector.gateway.patch_calls().len(), 3);

    let successes = events
        .iter()
        .filter(|e| matches!(e, PatchEvent::PatchResult { status: PatchStatus::Success, .. }))
        .count();
    assert_eq!(successes, 3);
}

// ============================================================================
// Setup Failures
// ============================================================================

#[tokio::test]
async fn test_no_revised_actions() {
    let connector = connector();
    let actions = vec![
        json!({"description": "keep", "status": "UNCHANGED", "changes": []}),
        json!({"description": "empty", "status": "REVISED", "changes": []}),
    ];

    let (end, events) = run_patch(connector.clone(), actions).await;
    assert_eq!(
        events,
        vec![
            PatchEvent::PatchStarted,
            PatchEvent::PatchDone {
                summary: "No revised actions to apply".to_string()
            },
        ]
    );
    assert_eq!(end, completed(0, 0));
    assert!(connector.connects().is_empty());
}

#[tokio::test]
async fn test_missing_tools_emit_single_error() {
    let connector = Arc::new(MockConnector::new(
        MockGateway::new()
            .without_tool("list_release_bindings")
            .without_tool("patch_release_binding"),
    ));
    let actions = vec![revised(
        "x",
        vec![change("ReleaseBinding api-dev", "spec.traitOverrides.a", "1")],
    )];

    let (end, events) = run_patch(connector.clone(), actions).await;
    let message =
        "Required MCP tools not available: list_release_bindings, patch_release_binding";
    assert_eq!(events, vec![PatchEvent::error(message)]);
    assert_eq!(end, PatchRunEnd::Aborted(message.to_string()));
    assert!(connector.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_actions_emit_single_error() {
    let connector = connector();
    let actions = vec![revised(
        "bad path",
        vec![change("ReleaseBinding api-dev", "spec.secretOverrides.x", "1")],
    )];

    let (_, events) = run_patch(connector.clone(), actions).await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        PatchEvent::Error { message } => {
            assert!(message.starts_with("Invalid patch actions:"));
            assert!(message.contains("secretOverrides"));
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert!(connector.connects().is_empty());
}

#[tokio::test]
async fn test_malformed_reference_emits_single_error() {
    let actions = vec![revised(
        "x",
        vec![change("ReleaseBinding", "spec.traitOverrides.a", "1")],
    )];
    let (_, events) = run_patch(connector(), actions).await;
    assert_eq!(events.len(), 1);
    assert!(events[0].is_terminal());
}

#[tokio::test]
async fn test_connect_failure_emits_single_error() {
    let connector = Arc::new(MockConnector::refusing("connection refused"));
    let actions = vec![revised(
        "x",
        vec![change("ReleaseBinding api-dev", "spec.traitOverrides.a", "1")],
    )];

    let (_, events) = run_patch(connector.clone(), actions).await;
    assert_eq!(
        events,
        vec![PatchEvent::error(
            "Failed to connect to MCP server: Gateway error: connection refused"
        )]
    );
    assert_eq!(connector.connects(), vec!["token-1".to_string()]);
}

#[tokio::test]
async fn test_binding_resolution_failure_emits_single_error() {
    let mut gateway = MockGateway::new().with_binding("api", api_binding());
    gateway.broken_components = true;
    let connector = Arc::new(MockConnector::new(gateway));
    let actions = vec![revised(
        "x",
        vec![change("ReleaseBinding api-dev", "spec.traitOverrides.a", "1")],
    )];

    let (_, events) = run_patch(connector, actions).await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        PatchEvent::Error { message } => {
            assert!(message.starts_with("Failed to resolve release bindings:"))
        }
        other => panic!("expected error, got {:?}", other),
    }
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_dropped_receiver_cancels_before_any_patch() {
    let connector = connector();
    let applier = RemediationApplier::new(connector.clone());
    let (tx, rx) = mpsc::channel(8);
    drop(rx);

    let actions = vec![revised(
        "x",
        vec![change("ReleaseBinding api-dev", "spec.traitOverrides.a", "1")],
    )];
    let end = applier
        .stream_patch(&actions, &scope(), &GatewayCredentials::bearer("t"), tx)
        .await;

    assert_eq!(end, PatchRunEnd::Cancelled);
    assert!(connector.gateway.patch_calls().is_empty());
}

#[tokio::test]
async fn test_receiver_dropped_mid_run_stops_the_run() {
    let connector = connector();
    let applier = RemediationApplier::new(connector.clone());
    let (tx, mut rx) = mpsc::channel(1);

    let actions = vec![
        revised(
            "first",
            vec![change("ReleaseBinding api-dev", "spec.traitOverrides.a", "1")],
        ),
        revised(
            "second",
            vec![change("ReleaseBinding worker-dev", "spec.traitOverrides.b", "2")],
        ),
    ];
    let run = tokio::spawn(async move {
        applier
            .stream_patch(&actions, &scope(), &GatewayCredentials::bearer("t"), tx)
            .await
    });

    assert_eq!(rx.recv().await, Some(PatchEvent::PatchStarted));
    drop(rx);

    let end = run.await.unwrap();
    assert_eq!(end, PatchRunEnd::Cancelled);
    // the second action is never reached
    assert!(connector.gateway.patch_calls().len() <= 1);
}
