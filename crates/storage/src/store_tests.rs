// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;
use tempfile::tempdir;
use wbab_core::{OpStatus, OperationRecord};

fn record(op_id: &str) -> OperationRecord {
    OperationRecord::builder().op_id(op_id).build()
}

#[test]
fn open_creates_tagged_document() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state/core-store.json");

    let store = OperationStore::open(&path).unwrap();

    assert!(path.exists());
    let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(doc["schema_version"], STORE_SCHEMA_VERSION);
    assert!(doc["operations"].is_object());
    assert!(!store.instance_id().unwrap().is_empty());
}

#[test]
fn instance_id_is_stable_across_reads_and_reopens() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("core-store.json");

    let store = OperationStore::open(&path).unwrap();
    let first = store.instance_id().unwrap();
    // Stable on repeated reads of the same handle...
    assert_eq!(store.instance_id().unwrap(), first);
    // ...and across a daemon restart.
    let second = OperationStore::open(&path).unwrap().instance_id().unwrap();
    assert_eq!(first, second);
}

#[test]
fn get_returns_none_for_unknown_op() {
    let dir = tempdir().unwrap();
    let store = OperationStore::open(dir.path().join("s.json")).unwrap();
    assert!(store.get("missing").unwrap().is_none());
}

#[test]
fn upsert_then_get_round_trips() {
    let dir = tempdir().unwrap();
    let store = OperationStore::open(dir.path().join("s.json")).unwrap();

    let mut rec = record("op-1");
    store.upsert("op-1", &rec).unwrap();
    assert_eq!(store.get("op-1").unwrap().unwrap(), rec);

    rec.status = OpStatus::Succeeded;
    rec.finished_at = Some(2_000);
    store.upsert("op-1", &rec).unwrap();

    let loaded = store.get("op-1").unwrap().unwrap();
    assert_eq!(loaded.status, OpStatus::Succeeded);
    assert_eq!(loaded.finished_at, Some(2_000));
}

#[test]
fn list_all_returns_snapshot_of_writes() {
    let dir = tempdir().unwrap();
    let store = OperationStore::open(dir.path().join("s.json")).unwrap();

    for i in 0..5 {
        let id = format!("op-{i}");
        store.upsert(&id, &record(&id)).unwrap();
    }

    let mut ids: Vec<String> = store.list_all().unwrap().into_iter().map(|r| r.op_id).collect();
    ids.sort();
    assert_eq!(ids, vec!["op-0", "op-1", "op-2", "op-3", "op-4"]);
}

#[test]
fn corrupt_record_is_fatal_only_for_its_op_id() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("s.json");
    let store = OperationStore::open(&path).unwrap();
    store.upsert("good", &record("good")).unwrap();

    // Corrupt one payload by hand.
    let mut doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    doc["operations"]["bad"] = json!({"op_id": 42});
    std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

    assert!(matches!(
        store.get("bad"),
        Err(StoreError::CorruptRecord { op_id }) if op_id == "bad"
    ));
    assert!(store.get("good").unwrap().is_some());

    // list_all skips the corrupt entry rather than failing.
    let listed = store.list_all().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].op_id, "good");
}

#[test]
fn concurrent_upserts_from_many_threads_all_land() {
    let dir = tempdir().unwrap();
    let store = Arc::new(OperationStore::open(dir.path().join("s.json")).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for j in 0..5 {
                    let id = format!("op-{i}-{j}");
                    store.upsert(&id, &record(&id)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.list_all().unwrap().len(), 40);
}

#[test]
fn two_store_handles_share_one_document() {
    // Separate handles hold no shared in-memory state, so this exercises
    // the same coordination two daemon processes would use.
    let dir = tempdir().unwrap();
    let path = dir.path().join("s.json");
    let a = OperationStore::open(&path).unwrap();
    let b = OperationStore::open(&path).unwrap();

    a.upsert("from-a", &record("from-a")).unwrap();
    b.upsert("from-b", &record("from-b")).unwrap();

    assert!(a.get("from-b").unwrap().is_some());
    assert!(b.get("from-a").unwrap().is_some());
    assert_eq!(a.instance_id().unwrap(), b.instance_id().unwrap());
}
