// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure paths: validation, verb failure + rollback, throttling,
//! lock contention, and path jailing.

use super::*;
use crate::exec::EXIT_CODE_TIMEOUT;
use crate::lock::LOCK_FILE_NAME;
use std::time::Duration;
use wbab_core::{FailureKind, OpStatus, OutcomeStatus, StepStatus};

#[tokio::test]
async fn smoke_without_installer_fails_validation() {
    let h = Harness::new();

    let outcome = h.executor.run(plan("V", Verb::Smoke, &[]), &h.ctx).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.result.kind, Some(FailureKind::ValidationFailure));
    assert_eq!(outcome.result.step.as_deref(), Some("validate_inputs"));
    assert!(outcome.result.error.as_deref().unwrap().contains("installer"));

    let record = h.store.get("V").unwrap().unwrap();
    assert_eq!(record.status, OpStatus::Failed);
    assert_eq!(record.step("validate_inputs").unwrap().status, StepStatus::Failed);

    let types = h.event_types();
    assert!(types.contains(&"step.failed".to_string()));
    assert!(types.contains(&"operation.failed".to_string()));
}

#[tokio::test]
async fn failing_verb_rolls_back_its_outputs() {
    let h = Harness::new();
    // The child creates out/ and then fails; rollback must remove it.
    h.install_tool("tools/winbuild-build.sh", "mkdir -p \"$1/out\"; echo broken; exit 2");
    let proj = h.project("proj");

    let outcome = h.executor.run(plan("D", Verb::Build, &[&proj]), &h.ctx).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.result.kind, Some(FailureKind::VerbExecution));
    assert_eq!(outcome.result.exit_code, Some(2));
    assert_eq!(outcome.result.step.as_deref(), Some("execute_build"));
    assert!(outcome.result.stdout.as_deref().unwrap().contains("broken"));

    assert!(!h.project_path("proj").join("out").exists(), "rollback removes out/");

    let rollback: Vec<_> = h
        .events()
        .into_iter()
        .filter(|e| e["event_type"] == "system.rollback")
        .collect();
    assert_eq!(rollback.len(), 1);
    let rolled_path = rollback[0]["details"]["path"].as_str().unwrap().to_string();
    assert!(rolled_path.ends_with("/out"));
}

#[tokio::test]
async fn validation_failure_does_not_roll_back() {
    let h = Harness::new();
    // Smoke with empty args targets the root; leave an out/ there to prove
    // rollback stays off the validation path.
    std::fs::create_dir_all(h.root.path().join("out")).unwrap();

    h.executor.run(plan("V", Verb::Smoke, &[]), &h.ctx).await.unwrap();

    assert!(h.root.path().join("out").exists());
    assert!(!h.event_types().contains(&"system.rollback".to_string()));
}

#[tokio::test]
async fn retry_resumes_from_the_failed_step() {
    let h = Harness::new();
    h.install_tool("tools/winbuild-build.sh", "exit 2");
    let proj = h.project("proj");

    let first = h.executor.run(plan("R", Verb::Build, &[&proj]), &h.ctx).await.unwrap();
    assert_eq!(first.status, OutcomeStatus::Failed);

    // Fix the tool and resubmit.
    h.install_tool("tools/winbuild-build.sh", "mkdir -p \"$1/out\"; exit 0");
    let second = h.executor.run(plan("R", Verb::Build, &[&proj]), &h.ctx).await.unwrap();

    assert_eq!(second.status, OutcomeStatus::Succeeded);
    let record = h.store.get("R").unwrap().unwrap();
    assert_eq!(record.attempts, 2);
    assert_eq!(record.retry_count, 1);
    // validate_inputs succeeded on the first run and was not re-run.
    assert_eq!(record.step("validate_inputs").unwrap().attempts, 1);
    assert_eq!(record.step("execute_build").unwrap().attempts, 2);
}

#[tokio::test]
async fn repeated_failures_are_throttled_with_backoff() {
    let h = Harness::new();
    h.install_tool("tools/winbuild-build.sh", "exit 1");
    let proj = h.project("proj");
    let submit = || h.executor.run(plan("E", Verb::Build, &[&proj]), &h.ctx);

    // First two attempts run back to back (backoff after one attempt is 0).
    assert_eq!(submit().await.unwrap().status, OutcomeStatus::Failed);
    assert_eq!(submit().await.unwrap().status, OutcomeStatus::Failed);
    assert_eq!(h.store.get("E").unwrap().unwrap().attempts, 2);

    // Third immediate submission hits the 2^2 = 4s window.
    let throttled = submit().await.unwrap();
    assert_eq!(throttled.result.kind, Some(FailureKind::Throttled));
    assert_eq!(throttled.result.step.as_deref(), Some("throttling_check"));
    let wait = throttled.result.retry_after_secs.unwrap();
    assert!(wait > 0 && wait <= 4, "wait = {wait}");
    // A throttled submission is not an attempt.
    assert_eq!(h.store.get("E").unwrap().unwrap().attempts, 2);

    // Past the window the attempt runs again.
    h.clock.advance(Duration::from_secs(5));
    assert_eq!(submit().await.unwrap().status, OutcomeStatus::Failed);
    assert_eq!(h.store.get("E").unwrap().unwrap().attempts, 3);

    // And the next window is min(300, 2^3) = 8s.
    let throttled = submit().await.unwrap();
    let wait = throttled.result.retry_after_secs.unwrap();
    assert!(wait > 4 && wait <= 8, "wait = {wait}");
}

#[tokio::test]
async fn busy_workspace_fails_with_lock_step() {
    let h = Harness::new();
    h.install_tool("tools/wbab", "exit 0");
    let proj = h.project("proj");
    let held = WorkspaceLock::acquire(&h.project_path("proj").canonicalize().unwrap()).unwrap();

    let outcome = h.executor.run(plan("L", Verb::Doctor, &[&proj]), &h.ctx).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.result.kind, Some(FailureKind::WorkspaceBusy));
    assert_eq!(outcome.result.step.as_deref(), Some("acquire_workspace_lock"));
    assert!(outcome.result.error.as_deref().unwrap().contains(".wbab.lock"));
    drop(held);

    // Freed lock lets the same plan through.
    let retry = h.executor.run(plan("L", Verb::Doctor, &[&proj]), &h.ctx).await.unwrap();
    assert_eq!(retry.status, OutcomeStatus::Succeeded);
}

#[tokio::test]
async fn directories_outside_the_root_are_jailed() {
    let h = Harness::new();
    let outside = tempfile::TempDir::new().unwrap();

    let outcome = h
        .executor
        .run(plan("J", Verb::Doctor, &[outside.path().to_str().unwrap()]), &h.ctx)
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.result.kind, Some(FailureKind::PathJailing));
    assert_eq!(outcome.result.step.as_deref(), Some("path_jailing"));
    // Jailing happens before any side effect: no record, no lock.
    assert!(h.store.get("J").unwrap().is_none());
    assert!(!outside.path().join(LOCK_FILE_NAME).exists());
}

#[tokio::test]
async fn dot_dot_traversal_is_jailed() {
    let h = Harness::new();

    let outcome = h
        .executor
        .run(plan("J2", Verb::Doctor, &["../"]), &h.ctx)
        .await
        .unwrap();

    assert_eq!(outcome.result.kind, Some(FailureKind::PathJailing));
}

#[tokio::test]
async fn unresolvable_project_dir_is_jailed() {
    let h = Harness::new();

    let outcome = h
        .executor
        .run(plan("J3", Verb::Doctor, &["./does-not-exist"]), &h.ctx)
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.result.kind, Some(FailureKind::PathJailing));
    assert!(outcome.result.error.as_deref().unwrap().contains("cannot be resolved"));
}

#[tokio::test]
async fn timed_out_child_reports_exit_124() {
    let h = Harness::new();
    h.install_tool("tools/wbab", "sleep 30");
    let config = h.config.clone().exec_timeout_secs(1);
    let executor = Executor::new(
        config,
        std::sync::Arc::clone(&h.store),
        std::sync::Arc::clone(&h.audit),
        h.clock.clone(),
    );

    let outcome = executor.run(plan("T", Verb::Doctor, &[]), &h.ctx).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.result.exit_code, Some(EXIT_CODE_TIMEOUT));
    assert!(outcome.result.stdout.as_deref().unwrap().contains("timed out"));
    assert_eq!(outcome.result.kind, Some(FailureKind::VerbExecution));
}

#[tokio::test]
async fn disallowed_clone_host_is_a_security_failure() {
    let h = Harness::new();
    let config = h.config.clone().allowed_hosts(vec!["git.example.com".to_string()]);
    let executor = Executor::new(
        config,
        std::sync::Arc::clone(&h.store),
        std::sync::Arc::clone(&h.audit),
        h.clock.clone(),
    );

    let plan = Plan::new(
        "S",
        Verb::Doctor,
        vec![],
        SourceSpec::Git { url: "https://forge.invalid/repo".to_string(), git_ref: String::new() },
    );
    let outcome = executor.run(plan, &h.ctx).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.result.kind, Some(FailureKind::SecurityPolicy));
    assert_eq!(outcome.result.step.as_deref(), Some("source_fetch"));
}

#[tokio::test]
async fn dash_prefixed_ref_is_a_security_failure() {
    let h = Harness::new();

    let plan = Plan::new(
        "S2",
        Verb::Doctor,
        vec![],
        SourceSpec::Git {
            url: "https://host/repo".to_string(),
            git_ref: "--upload-pack=/bin/true".to_string(),
        },
    );
    let outcome = h.executor.run(plan, &h.ctx).await.unwrap();

    assert_eq!(outcome.result.kind, Some(FailureKind::SecurityPolicy));
}
