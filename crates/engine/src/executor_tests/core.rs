// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Happy-path phases and the step machine.

use super::*;
use crate::lock::LOCK_FILE_NAME;
use wbab_core::{OpStatus, OutcomeStatus, StepStatus};

#[tokio::test]
async fn doctor_happy_path_reaches_succeeded() {
    let h = Harness::new();
    h.install_tool("tools/wbab", "echo doctor-ok; exit 0");

    let outcome = h.executor.run(plan("A", Verb::Doctor, &[]), &h.ctx).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    assert_eq!(outcome.result.exit_code, Some(0));
    assert!(outcome.result.stdout.as_deref().unwrap().contains("doctor-ok"));

    let record = h.store.get("A").unwrap().unwrap();
    assert_eq!(record.status, OpStatus::Succeeded);
    assert_eq!(record.attempts, 1);
    assert_eq!(record.retry_count, 0);
    assert!(record.finished_at.is_some());
    for step in ["validate_inputs", "execute_doctor", "record_result"] {
        assert_eq!(record.step(step).unwrap().status, StepStatus::Succeeded, "step {step}");
    }
}

#[tokio::test]
async fn audit_trail_covers_every_transition_in_order() {
    let h = Harness::new();
    h.install_tool("tools/wbab", "exit 0");

    h.executor.run(plan("A", Verb::Doctor, &[]), &h.ctx).await.unwrap();

    assert_eq!(
        h.event_types(),
        vec![
            "operation.started",
            "step.started",
            "step.succeeded",
            "step.started",
            "step.succeeded",
            "step.started",
            "step.succeeded",
            "operation.succeeded",
        ]
    );

    // Context propagates into every event.
    for event in h.events() {
        assert_eq!(event["actor"], "tester");
        assert_eq!(event["session_id"], "sess-1");
    }
}

#[tokio::test]
async fn runtime_args_are_rewritten_to_the_resolved_path() {
    let h = Harness::new();
    h.install_tool("tools/winbuild-build.sh", "mkdir -p \"$1/out\"; exit 0");
    let proj = h.project("proj");

    h.executor.run(plan("B", Verb::Build, &[&proj]), &h.ctx).await.unwrap();

    let record = h.store.get("B").unwrap().unwrap();
    let arg0 = std::path::PathBuf::from(&record.args[0]);
    assert!(arg0.is_absolute());
    assert_eq!(arg0, h.project_path("proj").canonicalize().unwrap());
}

#[tokio::test]
async fn empty_args_target_the_project_root() {
    let h = Harness::new();
    h.install_tool("tools/wbab", "exit 0");

    h.executor.run(plan("A", Verb::Doctor, &[]), &h.ctx).await.unwrap();

    let record = h.store.get("A").unwrap().unwrap();
    assert_eq!(
        std::path::PathBuf::from(&record.args[0]),
        h.root.path().canonicalize().unwrap()
    );
    // The lock file lands in the project root.
    assert!(h.root.path().join(LOCK_FILE_NAME).exists());
}

#[tokio::test]
async fn lock_is_released_after_the_run() {
    let h = Harness::new();
    h.install_tool("tools/wbab", "exit 0");

    h.executor.run(plan("A", Verb::Doctor, &[]), &h.ctx).await.unwrap();

    assert!(!WorkspaceLock::is_held(h.root.path()));
}

#[tokio::test]
async fn smoke_passes_installer_through_to_the_tool() {
    let h = Harness::new();
    // $2 is the installer (after the rewritten project dir).
    h.install_tool("tools/winebot-smoke.sh", "echo \"installer=$2\"; exit 0");
    let proj = h.project("proj");

    let outcome = h
        .executor
        .run(plan("S", Verb::Smoke, &[&proj, "app-setup.exe"]), &h.ctx)
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    assert!(outcome.result.stdout.as_deref().unwrap().contains("installer=app-setup.exe"));
}
