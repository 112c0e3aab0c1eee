// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::fake::{noop_persister, FakeResyncStore};
use crate::store::{DB_ONLINE, DB_RESYNCING};

fn resync(store: FakeResyncStore) -> (ResyncProcess, Arc<DatabaseState>) {
    let database = Arc::new(DatabaseState::new());
    (ResyncProcess::new(Arc::new(store), Arc::clone(&database)), database)
}

#[tokio::test]
async fn run_reports_processed_and_changed_counts() {
    let (process, _database) = resync(FakeResyncStore::completing(10, 3));
    process
        .run(&RunOptions::default(), noop_persister(), Terminator::new())
        .await
        .unwrap();

    let bytes = process.process_status(StatusEnvelope::default()).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["docs_processed"], 10);
    assert_eq!(json["docs_changed"], 3);
    assert_eq!(json["status"], "completed");
}

#[tokio::test]
async fn run_hands_database_back_to_offline() {
    let (process, database) = resync(FakeResyncStore::completing(2, 0));
    database.set_run_state(DB_RESYNCING);
    process
        .run(&RunOptions::default(), noop_persister(), Terminator::new())
        .await
        .unwrap();
    assert_eq!(database.run_state(), crate::store::DB_OFFLINE);
}

#[tokio::test]
async fn run_preserves_external_state_transition() {
    let (process, database) = resync(FakeResyncStore::completing(2, 0));
    database.set_run_state(DB_ONLINE);
    process
        .run(&RunOptions::default(), noop_persister(), Terminator::new())
        .await
        .unwrap();
    assert_eq!(database.run_state(), DB_ONLINE);
}

#[tokio::test]
async fn run_restores_database_state_on_error() {
    let (process, database) = resync(FakeResyncStore::failing("scan blew up"));
    database.set_run_state(DB_RESYNCING);
    let err = process
        .run(&RunOptions::default(), noop_persister(), Terminator::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("scan blew up"));
    assert_eq!(database.run_state(), crate::store::DB_OFFLINE);
}

#[tokio::test]
async fn closed_terminator_short_circuits_the_scan() {
    let (process, _database) = resync(FakeResyncStore::completing(100, 0));
    let terminator = Terminator::new();
    terminator.close();
    process.run(&RunOptions::default(), noop_persister(), terminator).await.unwrap();

    let bytes = process.process_status(StatusEnvelope::default()).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["docs_processed"], 0);
}

#[tokio::test]
async fn reset_status_zeroes_counters() {
    let (process, _database) = resync(FakeResyncStore::completing(5, 5));
    process
        .run(&RunOptions::default(), noop_persister(), Terminator::new())
        .await
        .unwrap();
    process.reset_status();

    let bytes = process.process_status(StatusEnvelope::default()).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["docs_processed"], 0);
    assert_eq!(json["docs_changed"], 0);
}
