// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document resync: a single-pass rescan of every document's channel
//! assignments.

use crate::manager::BackgroundManager;
use crate::process::{BackgroundProcess, ProcessError, RunOptions, StatusPersister};
use crate::store::{DatabaseState, ResyncStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use upkeep_core::{StatusEnvelope, Terminator};

/// Status payload published by resync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResyncStatus {
    #[serde(flatten)]
    pub envelope: StatusEnvelope,
    pub docs_changed: u64,
    pub docs_processed: u64,
}

pub struct ResyncProcess {
    store: Arc<dyn ResyncStore>,
    database: Arc<DatabaseState>,
    docs_processed: AtomicU64,
    docs_changed: AtomicU64,
}

impl ResyncProcess {
    pub fn new(store: Arc<dyn ResyncStore>, database: Arc<DatabaseState>) -> Self {
        Self {
            store,
            database,
            docs_processed: AtomicU64::new(0),
            docs_changed: AtomicU64::new(0),
        }
    }
}

/// Local-mode manager wired for resync.
pub fn new_resync_manager(
    store: Arc<dyn ResyncStore>,
    database: Arc<DatabaseState>,
) -> BackgroundManager {
    BackgroundManager::local(Arc::new(ResyncProcess::new(store, database)))
}

#[async_trait]
impl BackgroundProcess for ResyncProcess {
    async fn init(
        &self,
        _options: &RunOptions,
        _cluster_status: Option<&[u8]>,
    ) -> Result<(), ProcessError> {
        Ok(())
    }

    async fn run(
        &self,
        options: &RunOptions,
        _persist_status: StatusPersister,
        terminator: Terminator,
    ) -> Result<(), ProcessError> {
        let result = self
            .store
            .update_all_doc_channels(
                options.regenerate_sequences,
                &|processed, changed| {
                    self.docs_processed.store(processed, Ordering::SeqCst);
                    self.docs_changed.store(changed, Ordering::SeqCst);
                },
                &terminator,
            )
            .await;

        // Whatever the scan returned, hand the database back.
        self.database.end_resync();
        result?;
        Ok(())
    }

    fn process_status(&self, envelope: StatusEnvelope) -> Result<Vec<u8>, ProcessError> {
        let status = ResyncStatus {
            envelope,
            docs_changed: self.docs_changed.load(Ordering::SeqCst),
            docs_processed: self.docs_processed.load(Ordering::SeqCst),
        };
        Ok(serde_json::to_vec(&status)?)
    }

    fn reset_status(&self) {
        self.docs_processed.store(0, Ordering::SeqCst);
        self.docs_changed.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "resync_tests.rs"]
mod tests;
