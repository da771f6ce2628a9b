// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scoped acquisition of working directories for git sources.

use crate::error::ScmError;
use crate::sanitize::host_of;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

/// A cloned checkout whose directory lives only as long as this value.
///
/// Dropping removes the directory recursively on every exit path:
/// normal return, error propagation, panic unwind, or task cancellation.
pub struct ProvisionedSource {
    dir: TempDir,
}

impl ProvisionedSource {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Resolves git source descriptors into transient on-disk checkouts.
pub struct SourceProvisioner {
    sandbox_root: PathBuf,
    timeout: Duration,
    allowed_hosts: Vec<String>,
}

impl SourceProvisioner {
    /// `allowed_hosts` empty means no restriction.
    pub fn new(
        sandbox_root: impl Into<PathBuf>,
        timeout_secs: u64,
        allowed_hosts: Vec<String>,
    ) -> Self {
        Self {
            sandbox_root: sandbox_root.into(),
            timeout: Duration::from_secs(timeout_secs),
            allowed_hosts,
        }
    }

    /// Clone `url`, check out `git_ref` (when non-empty), and update
    /// submodules, yielding the checkout path.
    ///
    /// Policy checks run before any network I/O. On any failure the
    /// transient directory is removed before the error propagates.
    pub async fn provision(&self, url: &str, git_ref: &str) -> Result<ProvisionedSource, ScmError> {
        if !self.allowed_hosts.is_empty() {
            let host = host_of(url).unwrap_or_default();
            if !self.allowed_hosts.iter().any(|allowed| allowed == &host) {
                return Err(ScmError::HostNotAllowed { host });
            }
        }
        if git_ref.starts_with('-') {
            return Err(ScmError::InvalidRef { git_ref: git_ref.to_string() });
        }

        tokio::fs::create_dir_all(&self.sandbox_root).await?;
        let dir = tempfile::Builder::new()
            .prefix("git-source-")
            .tempdir_in(&self.sandbox_root)?;
        let source = ProvisionedSource { dir };
        let checkout = source.path().to_path_buf();
        let checkout_str = checkout.display().to_string();

        debug!(path = %checkout_str, "provisioning git source");

        self.run_git(&["clone", "--quiet", "--", url, &checkout_str], None)
            .await
            .map_err(|e| redact_credentials(e, url))?;
        if !git_ref.is_empty() {
            self.run_git(&["checkout", "--quiet", git_ref], Some(&checkout))
                .await
                .map_err(|e| redact_credentials(e, url))?;
        }
        self.run_git(
            &["submodule", "update", "--init", "--recursive", "--quiet"],
            Some(&checkout),
        )
        .await
        .map_err(|e| redact_credentials(e, url))?;

        Ok(source)
    }

    async fn run_git(&self, args: &[&str], cwd: Option<&Path>) -> Result<(), ScmError> {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(args = ?args, secs = self.timeout.as_secs(), "git operation timed out");
                return Err(ScmError::Timeout { secs: self.timeout.as_secs() });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScmError::GitFailed { message: stderr.trim().to_string() });
        }
        Ok(())
    }
}

/// Strip the URL's userinfo out of git output before it reaches logs.
///
/// Git echoes the URL it was given in its error messages, credentials
/// included; anything carrying those bytes must be rewritten.
fn redact_credentials(err: ScmError, url: &str) -> ScmError {
    let ScmError::GitFailed { message } = err else {
        return err;
    };
    let Some((_, rest)) = url.split_once("://") else {
        return ScmError::GitFailed { message };
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let message = match rest[..authority_end].rfind('@') {
        Some(at) if at > 0 => message.replace(&rest[..=at], "***:***@"),
        _ => message,
    };
    ScmError::GitFailed { message }
}

#[cfg(test)]
#[path = "provision_tests.rs"]
mod tests;
