// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn acquire_creates_directory_and_stamps_pid() {
    let dir = tempdir().unwrap();
    let project = dir.path().join("proj");

    let lock = WorkspaceLock::acquire(&project).unwrap();

    assert!(project.exists());
    assert_eq!(lock.path(), project.join(LOCK_FILE_NAME));
    assert_eq!(WorkspaceLock::read_pid(&project), Some(std::process::id()));
}

#[test]
fn second_acquire_fails_busy_naming_the_path() {
    let dir = tempdir().unwrap();
    let project = dir.path().to_path_buf();

    let _held = WorkspaceLock::acquire(&project).unwrap();
    let err = WorkspaceLock::acquire(&project).unwrap_err();

    match err {
        LockError::Busy { path } => assert_eq!(path, project.join(LOCK_FILE_NAME)),
        other => panic!("expected Busy, got {other:?}"),
    }
}

#[test]
fn release_keeps_the_file_but_frees_the_lock() {
    let dir = tempdir().unwrap();
    let project = dir.path().to_path_buf();

    let lock = WorkspaceLock::acquire(&project).unwrap();
    assert!(WorkspaceLock::is_held(&project));
    drop(lock);

    assert!(project.join(LOCK_FILE_NAME).exists());
    assert!(!WorkspaceLock::is_held(&project));
    // PID history stays readable after release.
    assert_eq!(WorkspaceLock::read_pid(&project), Some(std::process::id()));

    // And the lock is re-acquirable.
    let _again = WorkspaceLock::acquire(&project).unwrap();
}

#[test]
fn is_held_is_false_when_no_lock_file_exists() {
    let dir = tempdir().unwrap();
    assert!(!WorkspaceLock::is_held(dir.path()));
}

#[test]
fn read_pid_handles_missing_and_garbage_files() {
    let dir = tempdir().unwrap();
    assert_eq!(WorkspaceLock::read_pid(dir.path()), None);

    std::fs::write(dir.path().join(LOCK_FILE_NAME), "not-a-pid\n").unwrap();
    assert_eq!(WorkspaceLock::read_pid(dir.path()), None);
}

#[test]
fn locks_on_different_directories_are_independent() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");

    let _lock_a = WorkspaceLock::acquire(&a).unwrap();
    let _lock_b = WorkspaceLock::acquire(&b).unwrap();

    assert!(WorkspaceLock::is_held(&a));
    assert!(WorkspaceLock::is_held(&b));
}

#[test]
fn acquire_truncates_stale_pid_history() {
    let dir = tempdir().unwrap();
    let project = dir.path().to_path_buf();
    std::fs::write(project.join(LOCK_FILE_NAME), "99999999\n").unwrap();

    let _lock = WorkspaceLock::acquire(&project).unwrap();

    assert_eq!(WorkspaceLock::read_pid(&project), Some(std::process::id()));
}
