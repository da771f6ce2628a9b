// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level scenario specs for the WBAB core.
//!
//! These drive the public crate APIs end to end against a tempdir project
//! root with mock tool scripts, covering the behaviors a daemon operator
//! relies on: exactly-once results, cache soundness, lock serialization,
//! crash recovery, credential redaction, rollback, and throttling.

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/concurrency.rs"]
mod concurrency;
#[path = "specs/lifecycle.rs"]
mod lifecycle;
#[path = "specs/recovery.rs"]
mod recovery;
