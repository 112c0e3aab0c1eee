// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_returns_increasing_time() {
    let clock = SystemClock;
    let t1 = clock.epoch_ms();
    std::thread::sleep(Duration::from_millis(2));
    let t2 = clock.epoch_ms();
    assert!(t2 > t1);
}

#[test]
fn fake_clock_can_be_advanced() {
    let clock = FakeClock::new();
    let t1 = clock.epoch_ms();
    clock.advance(Duration::from_secs(60));
    assert_eq!(clock.epoch_ms(), t1 + 60_000);
}

#[test]
fn fake_clock_is_cloneable_and_shared() {
    let clock1 = FakeClock::new();
    let clock2 = clock1.clone();
    clock2.advance(Duration::from_secs(30));
    assert_eq!(clock1.epoch_ms(), clock2.epoch_ms());
}

#[test]
fn fake_clock_set_epoch_ms() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(42_000);
    assert_eq!(clock.epoch_ms(), 42_000);
}

#[test]
fn now_utc_matches_epoch_ms() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_000_000);
    assert_eq!(clock.now_utc().timestamp_millis(), 1_700_000_000_000);
}

#[test]
fn now_utc_serializes_as_rfc3339() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(0);
    let json = serde_json::to_string(&clock.now_utc()).unwrap();
    assert_eq!(json, "\"1970-01-01T00:00:00Z\"");
}
