// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation.

use super::*;
use wbab_core::{FailureKind, OpStatus, OutcomeStatus, RecordBuilder};

fn running_record(h: &Harness, op_id: &str, project_dir: &std::path::Path) {
    let record = RecordBuilder::default()
        .op_id(op_id)
        .args(vec![project_dir.display().to_string()])
        .build();
    h.store.upsert(op_id, &record).unwrap();
}

#[tokio::test]
async fn cancel_of_unknown_operation_is_an_error() {
    let h = Harness::new();
    let err = h.executor.cancel("nope", &h.ctx).unwrap_err();
    assert!(matches!(err, EngineError::UnknownOperation(id) if id == "nope"));
}

#[tokio::test]
async fn cancel_of_terminal_operation_is_an_error() {
    let h = Harness::new();
    h.install_tool("tools/wbab", "exit 0");
    h.executor.run(plan("A", Verb::Doctor, &[]), &h.ctx).await.unwrap();

    let err = h.executor.cancel("A", &h.ctx).unwrap_err();
    assert!(matches!(err, EngineError::NotRunning(id) if id == "A"));
}

#[tokio::test]
async fn cancel_signals_the_lock_pid_and_flips_the_record() {
    let h = Harness::new();
    let proj = h.project_path("proj");
    std::fs::create_dir_all(&proj).unwrap();
    running_record(&h, "C", &proj);

    // A stand-in child plays the crashed worker: its PID goes into the
    // lock file the way a holder would have written it.
    let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    std::fs::write(
        WorkspaceLock::lock_path(&proj),
        format!("{}\n", child.id()),
    )
    .unwrap();

    let outcome = h.executor.cancel("C", &h.ctx).unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.result.kind, Some(FailureKind::Cancelled));
    assert_eq!(outcome.result.step.as_deref(), Some("cancel"));
    assert_eq!(outcome.result.error.as_deref(), Some("Cancelled by user"));

    let record = h.store.get("C").unwrap().unwrap();
    assert_eq!(record.status, OpStatus::Failed);

    let cancelled: Vec<_> = h
        .events()
        .into_iter()
        .filter(|e| e["event_type"] == "operation.cancelled")
        .collect();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0]["details"]["signal"], "SIGTERM");

    // The SIGTERM landed: the child dies instead of sleeping out its 30s.
    let status = child.wait().unwrap();
    assert!(!status.success());
}

#[tokio::test]
async fn cancel_without_lock_file_notes_the_stale_state() {
    let h = Harness::new();
    let proj = h.project_path("gone");
    running_record(&h, "C2", &proj);

    let outcome = h.executor.cancel("C2", &h.ctx).unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome
        .result
        .error
        .as_deref()
        .unwrap()
        .contains("no workspace lock found"));
    assert_eq!(h.store.get("C2").unwrap().unwrap().status, OpStatus::Failed);
}
