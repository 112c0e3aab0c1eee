// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tombstone purge: a single pass removing tombstones past their metadata
//! purge interval.

use crate::manager::BackgroundManager;
use crate::process::{BackgroundProcess, ProcessError, RunOptions, StatusPersister};
use crate::store::{DatabaseState, TombstoneStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use upkeep_core::{StatusEnvelope, Terminator};

/// Status payload published by tombstone purge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TombstonePurgeStatus {
    #[serde(flatten)]
    pub envelope: StatusEnvelope,
    pub docs_purged: u64,
}

pub struct TombstonePurgeProcess {
    store: Arc<dyn TombstoneStore>,
    database: Arc<DatabaseState>,
    purged_doc_count: AtomicU64,
}

impl TombstonePurgeProcess {
    pub fn new(store: Arc<dyn TombstoneStore>, database: Arc<DatabaseState>) -> Self {
        Self { store, database, purged_doc_count: AtomicU64::new(0) }
    }
}

/// Local-mode manager wired for tombstone purge.
pub fn new_tombstone_purge_manager(
    store: Arc<dyn TombstoneStore>,
    database: Arc<DatabaseState>,
) -> BackgroundManager {
    BackgroundManager::local(Arc::new(TombstonePurgeProcess::new(store, database)))
}

#[async_trait]
impl BackgroundProcess for TombstonePurgeProcess {
    async fn init(
        &self,
        _options: &RunOptions,
        _cluster_status: Option<&[u8]>,
    ) -> Result<(), ProcessError> {
        self.database.stamp_compaction_start(chrono::Utc::now().timestamp_millis() as u64);
        Ok(())
    }

    async fn run(
        &self,
        _options: &RunOptions,
        _persist_status: StatusPersister,
        terminator: Terminator,
    ) -> Result<(), ProcessError> {
        let result = self
            .store
            .purge_tombstones(
                &|purged| {
                    self.purged_doc_count.store(purged, Ordering::SeqCst);
                },
                &terminator,
            )
            .await;

        self.database.end_compact();
        result?;
        Ok(())
    }

    fn process_status(&self, envelope: StatusEnvelope) -> Result<Vec<u8>, ProcessError> {
        let status = TombstonePurgeStatus {
            envelope,
            docs_purged: self.purged_doc_count.load(Ordering::SeqCst),
        };
        Ok(serde_json::to_vec(&status)?)
    }

    fn reset_status(&self) {
        self.purged_doc_count.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "tombstone_tests.rs"]
mod tests;
