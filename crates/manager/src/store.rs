// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document-store collaborator traits and the database run-state words.
//!
//! The domain logic behind each process (how documents are rescanned, how
//! attachments are marked and swept) lives outside this crate; processes see
//! it through these traits and fakes implement them in tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use thiserror::Error;
use upkeep_core::Terminator;

/// Failure reported by a store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation failed: {0}")]
    Backend(String),
}

pub const DB_OFFLINE: u32 = 0;
pub const DB_ONLINE: u32 = 1;
pub const DB_RESYNCING: u32 = 2;

pub const COMPACT_NOT_RUNNING: u32 = 0;
pub const COMPACT_RUNNING: u32 = 1;

/// Coarse run-state words a database exposes to its maintenance processes.
///
/// Processes flip these back on exit with a compare-and-swap so an external
/// transition (say, the admin taking the database online mid-run) is never
/// clobbered.
#[derive(Debug, Default)]
pub struct DatabaseState {
    run_state: AtomicU32,
    compact_state: AtomicU32,
    compaction_start_ms: AtomicU64,
}

impl DatabaseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_state(&self) -> u32 {
        self.run_state.load(Ordering::SeqCst)
    }

    pub fn set_run_state(&self, state: u32) {
        self.run_state.store(state, Ordering::SeqCst);
    }

    pub fn compact_state(&self) -> u32 {
        self.compact_state.load(Ordering::SeqCst)
    }

    pub fn set_compact_state(&self, state: u32) {
        self.compact_state.store(state, Ordering::SeqCst);
    }

    /// Resync finished: swap resyncing back to offline if still resyncing.
    pub fn end_resync(&self) {
        let _ = self.run_state.compare_exchange(
            DB_RESYNCING,
            DB_OFFLINE,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Compaction finished: swap running back to not-running if still running.
    pub fn end_compact(&self) {
        let _ = self.compact_state.compare_exchange(
            COMPACT_RUNNING,
            COMPACT_NOT_RUNNING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn stamp_compaction_start(&self, epoch_ms: u64) {
        self.compaction_start_ms.store(epoch_ms, Ordering::SeqCst);
    }

    pub fn compaction_start_ms(&self) -> u64 {
        self.compaction_start_ms.load(Ordering::SeqCst)
    }
}

/// Progress callback for resync: `(docs_processed, docs_changed)`.
pub type ResyncProgress<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Progress callback for tombstone purge: running purged-document count.
pub type PurgeProgress<'a> = &'a (dyn Fn(u64) + Send + Sync);

/// Full-database channel rescan.
#[async_trait]
pub trait ResyncStore: Send + Sync {
    /// Rescan every document, recomputing channel assignments. Reports
    /// progress after each document and polls the terminator at least once
    /// per document. Returns the number of documents processed.
    async fn update_all_doc_channels(
        &self,
        regenerate_sequences: bool,
        on_progress: ResyncProgress<'_>,
        terminator: &Terminator,
    ) -> Result<u64, StoreError>;
}

/// Tombstone removal for documents past their metadata purge interval.
#[async_trait]
pub trait TombstoneStore: Send + Sync {
    /// Purge eligible tombstones, reporting the running count after each
    /// batch. Returns the total purged.
    async fn purge_tombstones(
        &self,
        on_purge: PurgeProgress<'_>,
        terminator: &Terminator,
    ) -> Result<u64, StoreError>;
}

/// Mark-and-sweep attachment compaction.
///
/// `compact_id` tags the per-run metadata Mark writes, so Sweep and Cleanup
/// can tell this run's markers from a stale run's. Mark and Sweep add to the
/// supplied counters rather than overwriting them; a resumed run continues
/// accumulating from where the dead run left off.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn mark_attachments(
        &self,
        compact_id: &str,
        terminator: &Terminator,
        marked: &AtomicI64,
    ) -> Result<i64, StoreError>;

    async fn sweep_attachments(
        &self,
        compact_id: &str,
        dry_run: bool,
        terminator: &Terminator,
        purged: &AtomicI64,
    ) -> Result<i64, StoreError>;

    async fn cleanup_attachments(
        &self,
        compact_id: &str,
        terminator: &Terminator,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
