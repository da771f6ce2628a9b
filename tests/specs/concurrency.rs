// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrency specs: per-directory serialization, non-blocking scheduling.

use crate::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use wbab_core::{FailureKind, OutcomeStatus, Verb};

#[tokio::test]
async fn same_directory_submissions_serialize_on_the_workspace_lock() {
    let daemon = Daemon::start();
    // Long enough that the two submissions genuinely overlap.
    daemon.tool("tools/winbuild-test.sh", "sleep 1; exit 0");
    let proj = daemon.project("proj");

    let exec_a = Arc::clone(&daemon.executor);
    let exec_b = Arc::clone(&daemon.executor);
    let ctx = daemon.ctx.clone();
    let plan_a = local_plan("left", Verb::Test, &[&proj]);
    let plan_b = local_plan("right", Verb::Test, &[&proj]);

    let (a, b) = tokio::join!(
        tokio::spawn({
            let ctx = ctx.clone();
            async move { exec_a.run(plan_a, &ctx).await.unwrap() }
        }),
        tokio::spawn(async move { exec_b.run(plan_b, &ctx).await.unwrap() }),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let mut statuses = [a.status, b.status];
    statuses.sort_by_key(|s| *s == OutcomeStatus::Succeeded);
    assert_eq!(statuses[1], OutcomeStatus::Succeeded, "one submission wins the lock");

    let loser = if a.status == OutcomeStatus::Succeeded { &b } else { &a };
    assert_eq!(loser.status, OutcomeStatus::Failed);
    assert_eq!(loser.result.kind, Some(FailureKind::WorkspaceBusy));
    assert_eq!(loser.result.step.as_deref(), Some("acquire_workspace_lock"));
}

#[tokio::test]
async fn non_conflicting_requests_run_concurrently() {
    let daemon = Daemon::start();
    daemon.tool("tools/wbab", "sleep 2; exit 0");
    let proj_a = daemon.project("proj-a");
    let proj_b = daemon.project("proj-b");

    let exec_a = Arc::clone(&daemon.executor);
    let exec_b = Arc::clone(&daemon.executor);
    let ctx = daemon.ctx.clone();
    let plan_a = local_plan("op1", Verb::Doctor, &[&proj_a]);
    let plan_b = local_plan("op2", Verb::Doctor, &[&proj_b]);

    let started = Instant::now();
    let (a, b) = tokio::join!(
        tokio::spawn({
            let ctx = ctx.clone();
            async move { exec_a.run(plan_a, &ctx).await.unwrap() }
        }),
        tokio::spawn(async move { exec_b.run(plan_b, &ctx).await.unwrap() }),
    );
    let elapsed = started.elapsed();

    assert_eq!(a.unwrap().status, OutcomeStatus::Succeeded);
    assert_eq!(b.unwrap().status, OutcomeStatus::Succeeded);
    // Two 2-second children overlapping: roughly max, not sum.
    assert!(
        elapsed.as_secs_f64() < 3.8,
        "expected concurrent execution, took {elapsed:?}"
    );
}

#[tokio::test]
async fn per_op_transitions_stay_serial_under_concurrent_distinct_ops() {
    let daemon = Daemon::start();
    daemon.tool("tools/wbab", "exit 0");
    let projects: Vec<String> = (0..4).map(|i| daemon.project(&format!("p{i}"))).collect();

    let mut handles = Vec::new();
    for (i, proj) in projects.iter().enumerate() {
        let exec = Arc::clone(&daemon.executor);
        let ctx = daemon.ctx.clone();
        let plan = local_plan(&format!("op-{i}"), Verb::Doctor, &[proj]);
        handles.push(tokio::spawn(async move { exec.run(plan, &ctx).await.unwrap() }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().status, OutcomeStatus::Succeeded);
    }

    // Each op's audit events are a well-formed prefix-ordered lifecycle.
    for i in 0..4 {
        let op_id = format!("op-{i}");
        let types: Vec<String> = daemon
            .events()
            .into_iter()
            .filter(|e| e["op_id"] == op_id.as_str())
            .map(|e| e["event_type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(types.first().map(String::as_str), Some("operation.started"));
        assert_eq!(types.last().map(String::as_str), Some("operation.succeeded"));
    }
}
