// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL audit log.
//!
//! One JSON object per line, written in emission order and never rewritten.
//! A reader must be able to reconstruct the state-transition sequence for
//! any operation from its events alone.

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;
use wbab_core::{AuditEvent, RequestContext};

/// Schema tag written into every audit record.
pub const AUDIT_SCHEMA_VERSION: &str = "wbab.audit.v1";

/// Errors surfaced by audit log operations.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("audit serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The full on-disk shape of one audit record.
#[derive(Serialize)]
struct AuditRecord {
    schema_version: &'static str,
    event_id: String,
    ts: String,
    source: String,
    actor: String,
    session_id: String,
    event_type: wbab_core::EventType,
    op_id: String,
    verb: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

/// Append-only event emitter shared by all workers and the housekeeper.
pub struct AuditLog {
    path: PathBuf,
    source: String,
    file: Mutex<File>,
}

impl AuditLog {
    /// Open (or create) the log for appending. `source` is the daemon
    /// identity stamped into every event.
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Result<Self, AuditError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            source: source.into(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stamp identity and time onto `event` and append it.
    pub fn emit(&self, event: AuditEvent, ctx: &RequestContext) -> Result<(), AuditError> {
        let record = AuditRecord {
            schema_version: AUDIT_SCHEMA_VERSION,
            event_id: Uuid::new_v4().to_string(),
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            source: self.source.clone(),
            actor: ctx.actor.clone(),
            session_id: ctx.session_id.clone(),
            event_type: event.event_type,
            op_id: event.op_id,
            verb: event.verb,
            status: event.status,
            step: event.step,
            details: event.details,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
