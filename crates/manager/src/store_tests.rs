// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn end_resync_swaps_only_from_resyncing() {
    let db = DatabaseState::new();
    db.set_run_state(DB_RESYNCING);
    db.end_resync();
    assert_eq!(db.run_state(), DB_OFFLINE);

    // An external transition mid-run is preserved.
    db.set_run_state(DB_ONLINE);
    db.end_resync();
    assert_eq!(db.run_state(), DB_ONLINE);
}

#[test]
fn end_compact_swaps_only_from_running() {
    let db = DatabaseState::new();
    db.set_compact_state(COMPACT_RUNNING);
    db.end_compact();
    assert_eq!(db.compact_state(), COMPACT_NOT_RUNNING);

    db.set_compact_state(COMPACT_NOT_RUNNING);
    db.end_compact();
    assert_eq!(db.compact_state(), COMPACT_NOT_RUNNING);
}

#[test]
fn compaction_start_stamp_is_readable() {
    let db = DatabaseState::new();
    assert_eq!(db.compaction_start_ms(), 0);
    db.stamp_compaction_start(1_700_000_000_000);
    assert_eq!(db.compaction_start_ms(), 1_700_000_000_000);
}
