// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor tests: phases, step machine, cache, throttle, cancellation.

use super::*;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use wbab_core::FakeClock;

mod cache;
mod control;
mod core;
mod failure;

/// Test fixture: a tempdir project root with a mock-mode executor wired to
/// a fresh store, audit log, and fake clock.
pub(crate) struct Harness {
    pub root: TempDir,
    pub config: EngineConfig,
    pub store: Arc<OperationStore>,
    pub audit: Arc<AuditLog>,
    pub clock: FakeClock,
    pub executor: Executor<FakeClock>,
    pub ctx: RequestContext,
}

impl Harness {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let config = EngineConfig::new(root.path()).mock_exec(true).exec_timeout_secs(10);
        let store = Arc::new(OperationStore::open(&config.store_path).unwrap());
        let audit = Arc::new(AuditLog::new(&config.audit_path, "wbabd-test").unwrap());
        let clock = FakeClock::new();
        let executor = Executor::new(
            config.clone(),
            Arc::clone(&store),
            Arc::clone(&audit),
            clock.clone(),
        );
        Self { root, config, store, audit, clock, executor, ctx: RequestContext::new("tester", "sess-1") }
    }

    /// Install an executable mock tool script under `tools/`.
    pub fn install_tool(&self, rel: &str, body: &str) {
        let path = self.config.tool_path(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    /// Create a project subdirectory and return the relative arg for it.
    pub fn project(&self, name: &str) -> String {
        std::fs::create_dir_all(self.root.path().join(name)).unwrap();
        format!("./{name}")
    }

    pub fn project_path(&self, name: &str) -> std::path::PathBuf {
        self.root.path().join(name)
    }

    pub fn events(&self) -> Vec<Value> {
        std::fs::read_to_string(&self.config.audit_path)
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| e["event_type"].as_str().unwrap().to_string())
            .collect()
    }

    pub fn events_for(&self, op_id: &str) -> Vec<Value> {
        self.events().into_iter().filter(|e| e["op_id"] == op_id).collect()
    }
}

pub(crate) fn plan(op_id: &str, verb: Verb, args: &[&str]) -> Plan {
    Plan::new(
        op_id,
        verb,
        args.iter().map(|s| s.to_string()).collect(),
        SourceSpec::Local,
    )
}
