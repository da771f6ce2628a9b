// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration, derived from the process environment at the
//! daemon boundary and passed in explicitly everywhere else.

use std::path::{Path, PathBuf};

pub const DEFAULT_GIT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_IMAGE_TAG: &str = "v0.2.0";

/// Everything the executor and housekeeper need to know about their host.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Project root; all operation targets must resolve inside it.
    pub root_dir: PathBuf,
    pub store_path: PathBuf,
    pub audit_path: PathBuf,
    pub git_timeout_secs: u64,
    /// Permitted clone hosts; empty means unrestricted.
    pub allowed_hosts: Vec<String>,
    pub exec_timeout_secs: u64,
    /// Divert command synthesis to the local tool scripts.
    pub mock_exec: bool,
    pub image_tag: String,
}

impl EngineConfig {
    /// Defaults rooted at `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        let root_dir = root_dir.into();
        let state_dir = root_dir.join("agent-sandbox").join("state");
        Self {
            store_path: state_dir.join("core-store.json"),
            audit_path: state_dir.join("audit-log.jsonl"),
            root_dir,
            git_timeout_secs: DEFAULT_GIT_TIMEOUT_SECS,
            allowed_hosts: Vec::new(),
            exec_timeout_secs: DEFAULT_EXEC_TIMEOUT_SECS,
            mock_exec: false,
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
        }
    }

    /// Build a configuration from the recognized `WBAB_*`/`WBABD_*`
    /// environment variables. Intended for the daemon boundary only.
    pub fn from_env() -> Self {
        let root = std::env::var("WBAB_PROJECT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let mut config = Self::new(root);

        if let Ok(path) = std::env::var("WBABD_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("WBABD_AUDIT_LOG_PATH") {
            config.audit_path = PathBuf::from(path);
        }
        if let Some(secs) = env_u64("WBAB_GIT_TIMEOUT_SECS") {
            config.git_timeout_secs = secs;
        }
        if let Ok(hosts) = std::env::var("WBAB_GIT_ALLOWED_DOMAINS") {
            config.allowed_hosts = hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(secs) = env_u64("WBAB_EXECUTION_TIMEOUT_SECS") {
            config.exec_timeout_secs = secs;
        }
        if let Ok(flag) = std::env::var("WBAB_MOCK_EXEC") {
            config.mock_exec = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        if let Ok(tag) = std::env::var("WBAB_IMAGE_TAG") {
            if !tag.is_empty() {
                config.image_tag = tag;
            }
        }
        config
    }

    /// Sandbox root holding transient clones and state files.
    pub fn sandbox_dir(&self) -> PathBuf {
        self.root_dir.join("agent-sandbox")
    }

    /// Path of a local tool script relative to the project root.
    pub fn tool_path(&self, rel: &str) -> PathBuf {
        self.root_dir.join(rel)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.sandbox_dir().join("state")
    }

    /// True when `path` is the state directory (never pruned).
    pub fn is_state_dir(&self, path: &Path) -> bool {
        path.file_name().is_some_and(|name| name == "state")
    }

    pub fn image_tag(mut self, v: impl Into<String>) -> Self {
        self.image_tag = v.into();
        self
    }

    pub fn git_timeout_secs(mut self, v: u64) -> Self {
        self.git_timeout_secs = v;
        self
    }

    pub fn exec_timeout_secs(mut self, v: u64) -> Self {
        self.exec_timeout_secs = v;
        self
    }

    pub fn mock_exec(mut self, v: bool) -> Self {
        self.mock_exec = v;
        self
    }

    pub fn allowed_hosts(mut self, v: Vec<String>) -> Self {
        self.allowed_hosts = v;
        self
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
