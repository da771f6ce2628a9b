// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared spec fixtures.

use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use wbab_core::{FakeClock, Plan, RequestContext, SourceSpec, Verb};
use wbab_engine::{EngineConfig, Executor, Housekeeper};
use wbab_storage::{AuditLog, OperationStore};

/// A daemon-in-a-tempdir: mock-mode executor, housekeeper, store, and
/// audit log over one project root.
pub struct Daemon {
    pub root: TempDir,
    pub config: EngineConfig,
    pub store: Arc<OperationStore>,
    pub audit: Arc<AuditLog>,
    pub clock: FakeClock,
    pub executor: Arc<Executor<FakeClock>>,
    pub keeper: Housekeeper<FakeClock>,
    pub ctx: RequestContext,
}

impl Daemon {
    pub fn start() -> Self {
        let root = TempDir::new().unwrap();
        let config = EngineConfig::new(root.path()).mock_exec(true).exec_timeout_secs(30);
        let store = Arc::new(OperationStore::open(&config.store_path).unwrap());
        let instance_id = store.instance_id().unwrap();
        let audit = Arc::new(AuditLog::new(&config.audit_path, instance_id).unwrap());
        let clock = FakeClock::new();
        let executor = Arc::new(Executor::new(
            config.clone(),
            Arc::clone(&store),
            Arc::clone(&audit),
            clock.clone(),
        ));
        let keeper = Housekeeper::new(
            config.clone(),
            Arc::clone(&store),
            Arc::clone(&audit),
            clock.clone(),
        );
        Self {
            root,
            config,
            store,
            audit,
            clock,
            executor,
            keeper,
            ctx: RequestContext::new("spec", "spec-session"),
        }
    }

    /// Install an executable mock tool script under `tools/`.
    pub fn tool(&self, rel: &str, body: &str) {
        let path = self.config.tool_path(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    /// Create a project subdirectory; returns the relative arg form.
    pub fn project(&self, name: &str) -> String {
        std::fs::create_dir_all(self.root.path().join(name)).unwrap();
        format!("./{name}")
    }

    pub fn project_path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    pub fn events(&self) -> Vec<Value> {
        std::fs::read_to_string(self.audit.path())
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
}

pub fn local_plan(op_id: &str, verb: Verb, args: &[&str]) -> Plan {
    Plan::new(
        op_id,
        verb,
        args.iter().map(|s| s.to_string()).collect(),
        SourceSpec::Local,
    )
}

pub fn git_plan(op_id: &str, verb: Verb, args: &[&str], url: &str, git_ref: &str) -> Plan {
    Plan::new(
        op_id,
        verb,
        args.iter().map(|s| s.to_string()).collect(),
        SourceSpec::Git { url: url.to_string(), git_ref: git_ref.to_string() },
    )
}
