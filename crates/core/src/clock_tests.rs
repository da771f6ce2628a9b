// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_reports_plausible_epoch_seconds() {
    let clock = SystemClock;
    let a = clock.epoch_secs();
    let b = clock.epoch_secs();
    assert!(b >= a);
    // Sanity floor: well past 2020.
    assert!(a > 1_600_000_000);
}

#[test]
fn fake_clock_advances_by_whole_seconds() {
    let clock = FakeClock::new();
    let start = clock.epoch_secs();

    clock.advance(Duration::from_secs(5));
    assert_eq!(clock.epoch_secs(), start + 5);

    // Sub-second steps do not move the seconds scale.
    clock.advance(Duration::from_millis(900));
    assert_eq!(clock.epoch_secs(), start + 5);
}

#[test]
fn fake_clock_can_be_set_directly() {
    let clock = FakeClock::new();
    clock.set_epoch_secs(42);
    assert_eq!(clock.epoch_secs(), 42);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_secs(10));
    assert_eq!(other.epoch_secs(), clock.epoch_secs());
}
