// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Housekeeping sweeps: zombie recovery at startup, sandbox pruning over
//! time.

use crate::config::EngineConfig;
use crate::executor::EngineError;
use crate::lock::{LockError, WorkspaceLock};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use wbab_core::{
    AuditEvent, Clock, EventType, FailureKind, OpResult, OpStatus, RequestContext, SystemClock,
};
use wbab_storage::{AuditLog, OperationStore};

/// Runs recovery and pruning sweeps against the shared store and sandbox.
pub struct Housekeeper<C: Clock = SystemClock> {
    config: EngineConfig,
    store: Arc<OperationStore>,
    audit: Arc<AuditLog>,
    clock: C,
}

impl<C: Clock> Housekeeper<C> {
    pub fn new(
        config: EngineConfig,
        store: Arc<OperationStore>,
        audit: Arc<AuditLog>,
        clock: C,
    ) -> Self {
        Self { config, store, audit, clock }
    }

    /// Fail every `running` record whose workspace lock is no longer held
    /// by a live process. Intended to run at daemon startup, before
    /// serving traffic. Returns the number of records recovered.
    pub fn recover_zombies(&self, ctx: &RequestContext) -> Result<u32, EngineError> {
        let mut recovered = 0;
        for mut record in self.store.list_all()? {
            if record.status != OpStatus::Running {
                continue;
            }
            let project_dir = record
                .args
                .first()
                .map(PathBuf::from)
                .unwrap_or_else(|| self.config.root_dir.clone());

            match WorkspaceLock::acquire(&project_dir) {
                Ok(probe) => {
                    // Lock acquired: the prior holder is dead.
                    let result = OpResult::failure(
                        FailureKind::StaleLockRecovery,
                        "recover_zombies",
                        "stale workspace lock: holding process crashed or exited",
                    );
                    record.fail(self.clock.epoch_secs(), result);
                    self.store.upsert(&record.op_id, &record)?;
                    self.audit.emit(
                        AuditEvent::of(EventType::OperationRecovered)
                            .op_id(record.op_id.as_str())
                            .verb(record.verb.as_str())
                            .status("failed")
                            .details(json!({
                                "reason": "stale_lock",
                                "lock": probe.path().display().to_string(),
                            })),
                        ctx,
                    )?;
                    info!(op_id = %record.op_id, "recovered zombie operation");
                    recovered += 1;
                    drop(probe);
                }
                Err(LockError::Busy { .. }) => {
                    // Still held by a live worker; not a zombie.
                }
                Err(LockError::Io(e)) => {
                    warn!(op_id = %record.op_id, error = %e, "zombie probe failed");
                }
            }
        }
        Ok(recovered)
    }

    /// Prune stale top-level sandbox entries. An entry survives when it is
    /// the state directory, a running operation's workspace, younger than
    /// `max_age`, or covered by a currently-held workspace lock.
    /// Returns the number of entries removed.
    pub fn cleanup_sandbox(
        &self,
        max_age: Duration,
        ctx: &RequestContext,
    ) -> Result<u32, EngineError> {
        let sandbox = self.config.sandbox_dir();
        let running = self.running_workspaces()?;
        let mut pruned = 0;

        if sandbox.is_dir() {
            for entry in std::fs::read_dir(&sandbox)? {
                let Ok(entry) = entry else { continue };
                let path = entry.path();
                if self.config.is_state_dir(&path) {
                    continue;
                }
                if running.iter().any(|ws| ws.starts_with(&path)) {
                    continue;
                }
                if !older_than(&path, max_age) {
                    continue;
                }
                if WorkspaceLock::is_held(&path) {
                    continue;
                }
                match remove_entry(&path) {
                    Ok(()) => pruned += 1,
                    Err(e) => warn!(path = %path.display(), error = %e, "sandbox prune failed"),
                }
            }
        }

        self.audit.emit(
            AuditEvent::of(EventType::SystemCleanup).details(json!({
                "pruned": pruned,
                "max_age_secs": max_age.as_secs(),
            })),
            ctx,
        )?;
        info!(pruned, "sandbox cleanup complete");
        Ok(pruned)
    }

    /// Workspace paths of all records still marked running.
    fn running_workspaces(&self) -> Result<Vec<PathBuf>, EngineError> {
        Ok(self
            .store
            .list_all()?
            .into_iter()
            .filter(|r| r.status == OpStatus::Running)
            .filter_map(|r| r.args.first().map(PathBuf::from))
            .collect())
    }
}

fn older_than(path: &Path, max_age: Duration) -> bool {
    let Ok(metadata) = path.metadata() else {
        return false;
    };
    metadata
        .modified()
        .ok()
        .and_then(|mtime| mtime.elapsed().ok())
        .map(|age| age > max_age)
        .unwrap_or(false)
}

fn remove_entry(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}

#[cfg(test)]
#[path = "housekeeper_tests.rs"]
mod tests;
