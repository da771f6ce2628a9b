// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Failure modes of source provisioning, each a distinct kind.
#[derive(Debug, Error)]
pub enum ScmError {
    #[error("security policy violation: host '{host}' is not in the allow-list")]
    HostNotAllowed { host: String },

    #[error("invalid ref: {git_ref}")]
    InvalidRef { git_ref: String },

    #[error("git operation timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("git operation failed: {message}")]
    GitFailed { message: String },

    #[error("failed to prepare git source: {0}")]
    Io(#[from] std::io::Error),
}

impl ScmError {
    /// True for the policy violations that must never be retried.
    pub fn is_security(&self) -> bool {
        matches!(self, ScmError::HostNotAllowed { .. } | ScmError::InvalidRef { .. })
    }
}
