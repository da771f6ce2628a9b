// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit event vocabulary.
//!
//! Events describe lifecycle transitions; the audit log (wbab-storage) stamps
//! identity and time and appends them durably. The state store is the latest-
//! state truth, the audit log is the history; they overlap deliberately.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Dotted event names covering every lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "operation.started")]
    OperationStarted,
    #[serde(rename = "operation.succeeded")]
    OperationSucceeded,
    #[serde(rename = "operation.failed")]
    OperationFailed,
    #[serde(rename = "operation.cached")]
    OperationCached,
    #[serde(rename = "operation.cache_invalidated")]
    OperationCacheInvalidated,
    #[serde(rename = "operation.cancelled")]
    OperationCancelled,
    #[serde(rename = "operation.recovered")]
    OperationRecovered,
    #[serde(rename = "step.started")]
    StepStarted,
    #[serde(rename = "step.succeeded")]
    StepSucceeded,
    #[serde(rename = "step.failed")]
    StepFailed,
    #[serde(rename = "source.fetch")]
    SourceFetch,
    #[serde(rename = "source.artifacts")]
    SourceArtifacts,
    #[serde(rename = "system.rollback")]
    SystemRollback,
    #[serde(rename = "system.cleanup")]
    SystemCleanup,
}

crate::str_enum! {
    EventType {
        OperationStarted => "operation.started",
        OperationSucceeded => "operation.succeeded",
        OperationFailed => "operation.failed",
        OperationCached => "operation.cached",
        OperationCacheInvalidated => "operation.cache_invalidated",
        OperationCancelled => "operation.cancelled",
        OperationRecovered => "operation.recovered",
        StepStarted => "step.started",
        StepSucceeded => "step.succeeded",
        StepFailed => "step.failed",
        SourceFetch => "source.fetch",
        SourceArtifacts => "source.artifacts",
        SystemRollback => "system.rollback",
        SystemCleanup => "system.cleanup",
    }
}

/// One audit event as built by a caller, before the log stamps
/// `event_id`/`ts`/`source`/actor fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub event_type: EventType,
    pub op_id: String,
    pub verb: String,
    pub status: String,
    pub step: String,
    pub details: Option<Value>,
}

impl AuditEvent {
    pub fn of(event_type: EventType) -> Self {
        Self {
            event_type,
            op_id: String::new(),
            verb: String::new(),
            status: String::new(),
            step: String::new(),
            details: None,
        }
    }

    pub fn op_id(mut self, v: impl Into<String>) -> Self {
        self.op_id = v.into();
        self
    }

    pub fn verb(mut self, v: impl Into<String>) -> Self {
        self.verb = v.into();
        self
    }

    pub fn status(mut self, v: impl Into<String>) -> Self {
        self.status = v.into();
        self
    }

    pub fn step(mut self, v: impl Into<String>) -> Self {
        self.step = v.into();
        self
    }

    pub fn details(mut self, v: Value) -> Self {
        self.details = Some(v);
        self
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
