// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request-scoped identity propagated into audit events.

/// Who is driving an operation, carried through the executor rather than
/// read ambiently so concurrent requests can have distinct actors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub actor: String,
    pub session_id: String,
}

impl RequestContext {
    pub fn new(actor: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            session_id: session_id.into(),
        }
    }

    /// Read actor/session from the daemon environment. Intended for the
    /// request listener boundary only.
    pub fn from_env() -> Self {
        Self {
            actor: std::env::var("WBABD_ACTOR").unwrap_or_else(|_| "unknown".to_string()),
            session_id: std::env::var("WBABD_SESSION_ID").unwrap_or_default(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            actor: "unknown".to_string(),
            session_id: String::new(),
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
