// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory, PID-stamped workspace locks.
//!
//! The lock file plus a held OS-level flock jointly form the liveness
//! signal: a readable PID with no held flock means the prior holder is
//! gone. Release drops the flock but leaves the file in place for later
//! recovery sweeps.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Lock file kept inside each project directory.
pub const LOCK_FILE_NAME: &str = ".wbab.lock";

/// Errors surfaced by lock acquisition.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("workspace is locked by another process: {path}")]
    Busy { path: PathBuf },
    #[error("workspace lock I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exclusive hold on a project directory. Dropping releases the flock on
/// every exit path, including unwinds.
pub struct WorkspaceLock {
    file: File,
    path: PathBuf,
}

impl WorkspaceLock {
    pub fn lock_path(project_dir: &Path) -> PathBuf {
        project_dir.join(LOCK_FILE_NAME)
    }

    /// Non-blocking acquisition. Opens without truncating so a losing
    /// contender cannot wipe the holder's PID, then stamps our PID once
    /// the flock is held.
    pub fn acquire(project_dir: &Path) -> Result<Self, LockError> {
        std::fs::create_dir_all(project_dir)?;
        let path = Self::lock_path(project_dir);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        file.try_lock_exclusive().map_err(|e| {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                LockError::Busy { path: path.clone() }
            } else {
                LockError::Io(e)
            }
        })?;

        file.set_len(0)?;
        let mut file = file;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID recorded in the lock file, if the file exists and parses.
    /// Advisory only: authoritative liveness is the held flock.
    pub fn read_pid(project_dir: &Path) -> Option<u32> {
        let content = std::fs::read_to_string(Self::lock_path(project_dir)).ok()?;
        content.trim().parse().ok()
    }

    /// Whether some live process currently holds the lock.
    pub fn is_held(project_dir: &Path) -> bool {
        let path = Self::lock_path(project_dir);
        let Ok(file) = OpenOptions::new().read(true).write(true).open(&path) else {
            return false;
        };
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                false
            }
            Err(_) => true,
        }
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
