// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::fake::{noop_persister, FakeTombstoneStore};
use crate::store::{COMPACT_NOT_RUNNING, COMPACT_RUNNING};

fn purge(purge_count: u64) -> (TombstonePurgeProcess, Arc<DatabaseState>) {
    let database = Arc::new(DatabaseState::new());
    (
        TombstonePurgeProcess::new(
            Arc::new(FakeTombstoneStore { purge_count }),
            Arc::clone(&database),
        ),
        database,
    )
}

#[tokio::test]
async fn init_stamps_compaction_start() {
    let (process, database) = purge(0);
    assert_eq!(database.compaction_start_ms(), 0);
    process.init(&RunOptions::default(), None).await.unwrap();
    assert!(database.compaction_start_ms() > 0);
}

#[tokio::test]
async fn run_reports_purged_count() {
    let (process, _database) = purge(42);
    process
        .run(&RunOptions::default(), noop_persister(), Terminator::new())
        .await
        .unwrap();

    let bytes = process.process_status(StatusEnvelope::default()).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["docs_purged"], 42);
    assert_eq!(json["status"], "completed");
}

#[tokio::test]
async fn run_hands_compaction_state_back() {
    let (process, database) = purge(1);
    database.set_compact_state(COMPACT_RUNNING);
    process
        .run(&RunOptions::default(), noop_persister(), Terminator::new())
        .await
        .unwrap();
    assert_eq!(database.compact_state(), COMPACT_NOT_RUNNING);
}

#[tokio::test]
async fn reset_status_zeroes_the_counter() {
    let (process, _database) = purge(9);
    process
        .run(&RunOptions::default(), noop_persister(), Terminator::new())
        .await
        .unwrap();
    process.reset_status();

    let bytes = process.process_status(StatusEnvelope::default()).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["docs_purged"], 0);
}
