// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wall-clock time for operation records and throttling.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of wall-clock seconds.
///
/// Operation records keep `started_at`/`finished_at`/`last_attempt_at` in
/// whole seconds since the Unix epoch, and the throttle window arithmetic
/// runs on the same scale. Injecting the clock lets tests walk through
/// backoff windows without sleeping.
pub trait Clock: Clone + Send + Sync {
    /// Whole seconds since the Unix epoch.
    fn epoch_secs(&self) -> u64;
}

/// The host's real clock.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Settable clock for tests; clones observe the same time.
#[derive(Clone)]
pub struct FakeClock {
    secs: Arc<Mutex<u64>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            secs: Arc::new(Mutex::new(1_000_000)),
        }
    }

    /// Step forward by `duration`; sub-second remainders are dropped.
    pub fn advance(&self, duration: Duration) {
        *self.secs.lock() += duration.as_secs();
    }

    pub fn set_epoch_secs(&self, secs: u64) {
        *self.secs.lock() = secs;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn epoch_secs(&self) -> u64 {
        *self.secs.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
