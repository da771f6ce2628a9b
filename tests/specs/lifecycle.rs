// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation lifecycle specs: happy path, caching, rollback, throttling.

use crate::prelude::*;
use std::time::Duration;
use wbab_core::{FailureKind, OutcomeStatus, Verb};

#[tokio::test]
async fn doctor_succeeds_then_serves_cached() {
    let daemon = Daemon::start();
    daemon.tool("tools/wbab", "echo all-clear; exit 0");

    let first = daemon
        .executor
        .run(local_plan("A", Verb::Doctor, &[]), &daemon.ctx)
        .await
        .unwrap();
    assert_eq!(first.status, OutcomeStatus::Succeeded);
    assert_eq!(first.result.exit_code, Some(0));

    let second = daemon
        .executor
        .run(local_plan("A", Verb::Doctor, &[]), &daemon.ctx)
        .await
        .unwrap();
    assert_eq!(second.status, OutcomeStatus::Cached);
    assert_eq!(second.result.exit_code, Some(0));
    assert_eq!(
        serde_json::to_string(&second.result).unwrap(),
        serde_json::to_string(&first.result).unwrap(),
        "cached result replays bit-equal"
    );
}

#[tokio::test]
async fn deleting_build_outputs_invalidates_the_cache() {
    let daemon = Daemon::start();
    daemon.tool("tools/winbuild-build.sh", "mkdir -p \"$1/out\"; exit 0");
    let proj = daemon.project("proj");

    let first = daemon
        .executor
        .run(local_plan("B", Verb::Build, &[&proj]), &daemon.ctx)
        .await
        .unwrap();
    assert_eq!(first.status, OutcomeStatus::Succeeded);

    std::fs::remove_dir_all(daemon.project_path("proj").join("out")).unwrap();

    let second = daemon
        .executor
        .run(local_plan("B", Verb::Build, &[&proj]), &daemon.ctx)
        .await
        .unwrap();

    // Re-ran rather than serving a stale success.
    assert_eq!(second.status, OutcomeStatus::Succeeded);
    assert!(daemon.event_types().contains(&"operation.cache_invalidated".to_string()));
    assert!(daemon.project_path("proj").join("out").exists());
}

#[tokio::test]
async fn failed_build_rolls_back_the_out_directory() {
    let daemon = Daemon::start();
    daemon.tool("tools/winbuild-build.sh", "mkdir -p \"$1/out\"; exit 2");
    let proj = daemon.project("proj");

    let outcome = daemon
        .executor
        .run(local_plan("D", Verb::Build, &[&proj]), &daemon.ctx)
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.result.exit_code, Some(2));
    assert!(!daemon.project_path("proj").join("out").exists());

    let rollbacks: Vec<_> = daemon
        .events()
        .into_iter()
        .filter(|e| e["event_type"] == "system.rollback")
        .collect();
    assert_eq!(rollbacks.len(), 1);
    assert!(rollbacks[0]["details"]["path"].as_str().unwrap().ends_with("/out"));
}

#[tokio::test]
async fn fourth_submission_of_a_failing_operation_is_throttled() {
    let daemon = Daemon::start();
    daemon.tool("tools/winbuild-build.sh", "exit 1");
    let proj = daemon.project("proj");
    let submit =
        || daemon.executor.run(local_plan("E", Verb::Build, &[&proj]), &daemon.ctx);

    // Three failing runs, stepping the clock past each backoff window.
    assert_eq!(submit().await.unwrap().status, OutcomeStatus::Failed);
    assert_eq!(submit().await.unwrap().status, OutcomeStatus::Failed);
    daemon.clock.advance(Duration::from_secs(5));
    let third = submit().await.unwrap();
    assert_eq!(third.status, OutcomeStatus::Failed);
    assert_eq!(third.result.kind, Some(FailureKind::VerbExecution));

    // The fourth immediate submission hits the throttle.
    let fourth = submit().await.unwrap();
    assert_eq!(fourth.status, OutcomeStatus::Failed);
    assert_eq!(fourth.result.step.as_deref(), Some("throttling_check"));
    assert!(fourth.result.retry_after_secs.unwrap() > 0);
    assert!(fourth.result.error.as_deref().unwrap().contains("throttled"));
}

#[tokio::test]
async fn audit_events_for_an_op_form_an_ordered_lifecycle() {
    let daemon = Daemon::start();
    daemon.tool("tools/wbab", "exit 0");

    daemon
        .executor
        .run(local_plan("A", Verb::Doctor, &[]), &daemon.ctx)
        .await
        .unwrap();

    let for_op: Vec<String> = daemon
        .events()
        .into_iter()
        .filter(|e| e["op_id"] == "A")
        .map(|e| e["event_type"].as_str().unwrap().to_string())
        .collect();

    assert_eq!(for_op.first().map(String::as_str), Some("operation.started"));
    assert_eq!(for_op.last().map(String::as_str), Some("operation.succeeded"));
    let step_events: Vec<&String> =
        for_op.iter().filter(|t| t.starts_with("step.")).collect();
    assert_eq!(step_events.len(), 6, "three steps, started+succeeded each");
}
