// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn captures_exit_code_and_stdout() {
    let dir = tempdir().unwrap();
    let out = run_command(&argv(&["sh", "-c", "echo hello; exit 0"]), dir.path(), 10).await;

    assert_eq!(out.exit_code, 0);
    assert_eq!(out.output, "hello\n");
}

#[tokio::test]
async fn merges_stderr_into_the_output_stream() {
    let dir = tempdir().unwrap();
    let out =
        run_command(&argv(&["sh", "-c", "echo out; echo err >&2; exit 3"]), dir.path(), 10).await;

    assert_eq!(out.exit_code, 3);
    assert!(out.output.contains("out\n"));
    assert!(out.output.contains("err\n"));
}

#[tokio::test]
async fn timeout_yields_exit_124_with_message() {
    let dir = tempdir().unwrap();
    let out = run_command(&argv(&["sleep", "30"]), dir.path(), 1).await;

    assert_eq!(out.exit_code, EXIT_CODE_TIMEOUT);
    assert!(out.output.contains("timed out after 1 seconds"));
}

#[tokio::test]
async fn spawn_failure_is_reported_not_raised() {
    let dir = tempdir().unwrap();
    let out = run_command(&argv(&["/no/such/binary"]), dir.path(), 10).await;

    assert_eq!(out.exit_code, 127);
    assert!(out.output.contains("failed to spawn"));
}

#[tokio::test]
async fn empty_argv_is_reported_not_raised() {
    let dir = tempdir().unwrap();
    let out = run_command(&[], dir.path(), 10).await;

    assert_eq!(out.exit_code, 127);
    assert!(out.output.contains("empty command"));
}

#[tokio::test]
async fn runs_in_the_given_working_directory() {
    let dir = tempdir().unwrap();
    let out = run_command(&argv(&["pwd"]), dir.path(), 10).await;

    assert_eq!(out.exit_code, 0);
    let reported = out.output.trim();
    let expected = dir.path().canonicalize().unwrap();
    assert_eq!(std::path::Path::new(reported).canonicalize().unwrap(), expected);
}
