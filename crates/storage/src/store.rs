// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable operation store: one JSON document guarded by whole-file
//! advisory locks.
//!
//! Readers take a shared lock, writers an exclusive lock, and every write
//! rewrites the document in place under the lock, so records are never
//! observed torn across threads or across processes. Records are held as
//! raw JSON and decoded per access: a corrupt payload poisons only its own
//! `op_id`, not the store.

use fs2::FileExt;
use serde_json::{json, Value};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;
use wbab_core::OperationRecord;

/// Schema tag written into every store document.
pub const STORE_SCHEMA_VERSION: &str = "wbab.store.v1";

/// Schema assumed for documents written before tagging existed.
const LEGACY_SCHEMA: &str = "legacy.unversioned";

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store document error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported store schema: {0}")]
    UnsupportedSchema(String),
    #[error("corrupt record payload for operation {op_id}")]
    CorruptRecord { op_id: String },
}

/// Concurrency-safe mapping `op_id → OperationRecord`.
///
/// The struct holds no file handle: every operation opens the document,
/// locks it, and releases on return, so any number of store instances (in
/// any number of processes) coordinate purely through the OS lock.
pub struct OperationStore {
    path: PathBuf,
}

impl OperationStore {
    /// Open the store, creating or migrating the document as needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        if let Some(parent) = store.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Touch the document once so initialization and migration happen
        // eagerly and loudly; a brand-new store is persisted here, making
        // the minted instance_id stable from the first open on.
        store.with_exclusive(|_doc| Ok(((), false)))?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stable daemon identity minted on first initialization.
    pub fn instance_id(&self) -> Result<String, StoreError> {
        self.with_shared(|doc| {
            Ok(doc
                .get("instance_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string())
        })
    }

    /// Fetch the record for `op_id`, if any.
    pub fn get(&self, op_id: &str) -> Result<Option<OperationRecord>, StoreError> {
        self.with_shared(|doc| {
            let Some(payload) = doc.get("operations").and_then(|ops| ops.get(op_id)) else {
                return Ok(None);
            };
            let record = serde_json::from_value(payload.clone()).map_err(|e| {
                warn!(op_id, error = %e, "corrupt operation record payload");
                StoreError::CorruptRecord { op_id: op_id.to_string() }
            })?;
            Ok(Some(record))
        })
    }

    /// Insert or replace the record for `op_id`.
    pub fn upsert(&self, op_id: &str, record: &OperationRecord) -> Result<(), StoreError> {
        let payload = serde_json::to_value(record)?;
        self.with_exclusive(|doc| {
            let obj = document_object(doc)?;
            if !obj.get("operations").is_some_and(Value::is_object) {
                obj.insert("operations".to_string(), json!({}));
            }
            if let Some(ops) = obj.get_mut("operations").and_then(Value::as_object_mut) {
                ops.insert(op_id.to_string(), payload);
            }
            Ok(((), true))
        })
    }

    /// Snapshot of all decodable records, in no particular order.
    ///
    /// Corrupt payloads are skipped with a warning; they stay fatal for
    /// their own `op_id` via [`OperationStore::get`].
    pub fn list_all(&self) -> Result<Vec<OperationRecord>, StoreError> {
        self.with_shared(|doc| {
            let mut records = Vec::new();
            if let Some(ops) = doc.get("operations").and_then(Value::as_object) {
                for (op_id, payload) in ops {
                    match serde_json::from_value(payload.clone()) {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            warn!(op_id = %op_id, error = %e, "skipping corrupt record in list_all");
                        }
                    }
                }
            }
            Ok(records)
        })
    }

    fn open_file(&self) -> Result<File, StoreError> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?)
    }

    /// Run `f` against the document under a shared lock. Migration is
    /// applied in memory only; the document is not written back.
    fn with_shared<T>(&self, f: impl FnOnce(&Value) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut file = self.open_file()?;
        file.lock_shared()?;
        let (mut doc, _) = read_document(&mut file)?;
        migrate(&mut doc)?;
        f(&doc)
        // lock released when `file` drops
    }

    /// Run `f` against the document under an exclusive lock, rewriting the
    /// file when anything changed it: a freshly-synthesized document, a
    /// migration, or `f` itself.
    fn with_exclusive<T>(
        &self,
        f: impl FnOnce(&mut Value) -> Result<(T, bool), StoreError>,
    ) -> Result<T, StoreError> {
        let mut file = self.open_file()?;
        file.lock_exclusive()?;
        let (mut doc, synthesized) = read_document(&mut file)?;
        let migrated = migrate(&mut doc)?;
        let (out, changed) = f(&mut doc)?;
        if synthesized || migrated || changed {
            file.seek(SeekFrom::Start(0))?;
            file.set_len(0)?;
            let mut text = serde_json::to_string_pretty(&doc)?;
            text.push('\n');
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
        }
        Ok(out)
    }
}

/// Read the document, or synthesize a fresh one for a new/empty file.
///
/// The second element reports synthesis: a caller holding the exclusive
/// lock must persist a synthesized document, otherwise the minted
/// `instance_id` would never become durable.
fn read_document(file: &mut File) -> Result<(Value, bool), StoreError> {
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    if content.trim().is_empty() {
        return Ok((new_document(), true));
    }
    Ok((serde_json::from_str(&content)?, false))
}

fn new_document() -> Value {
    json!({
        "schema_version": STORE_SCHEMA_VERSION,
        "instance_id": Uuid::new_v4().to_string(),
        "operations": {},
    })
}

fn document_object(doc: &mut Value) -> Result<&mut serde_json::Map<String, Value>, StoreError> {
    match doc.as_object_mut() {
        Some(obj) => Ok(obj),
        None => Err(StoreError::UnsupportedSchema("non-object document".to_string())),
    }
}

fn schema_of(doc: &Value) -> String {
    match doc.get("schema_version").and_then(Value::as_str) {
        Some(schema) if !schema.trim().is_empty() => schema.to_string(),
        _ => LEGACY_SCHEMA.to_string(),
    }
}

/// Bring a document up to the current schema. Returns whether it changed.
///
/// Current documents are normalized (missing `operations`/`instance_id`
/// repaired); legacy documents are wrapped with a migration marker; anything
/// else fails loudly.
fn migrate(doc: &mut Value) -> Result<bool, StoreError> {
    let schema = schema_of(doc);
    if schema == STORE_SCHEMA_VERSION {
        let obj = document_object(doc)?;
        let mut changed = false;
        if !obj.get("operations").is_some_and(Value::is_object) {
            obj.insert("operations".to_string(), json!({}));
            changed = true;
        }
        if !obj.contains_key("instance_id") {
            obj.insert("instance_id".to_string(), json!(Uuid::new_v4().to_string()));
            changed = true;
        }
        return Ok(changed);
    }
    if schema == LEGACY_SCHEMA {
        let operations = doc
            .get("operations")
            .filter(|v| v.is_object())
            .cloned()
            .unwrap_or_else(|| json!({}));
        let migrated_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        *doc = json!({
            "schema_version": STORE_SCHEMA_VERSION,
            "instance_id": Uuid::new_v4().to_string(),
            "operations": operations,
            "migration": {
                "from_schema": LEGACY_SCHEMA,
                "migrated_at": migrated_at,
            },
        });
        return Ok(true);
    }
    Err(StoreError::UnsupportedSchema(schema))
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "migration_tests.rs"]
mod migration_tests;
