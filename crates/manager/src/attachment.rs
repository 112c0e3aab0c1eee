// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Attachment compaction: a multi-phase mark → sweep → cleanup pass that
//! survives a runner crash.
//!
//! The published status document doubles as the resumption token: it carries
//! the run's `compact_id`, the phase it reached, and the accumulated
//! counters. A fresh start against a non-completed prior status adopts all
//! of it and re-enters the ladder at the recorded phase.

use crate::cluster::ClusterOptions;
use crate::manager::BackgroundManager;
use crate::process::{BackgroundProcess, ProcessError, RunOptions, StatusPersister};
use crate::store::{AttachmentStore, DatabaseState};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use upkeep_bucket::Bucket;
use upkeep_core::{ProcessState, StatusEnvelope, Terminator};
use uuid::Uuid;

/// Cluster-wide name of the attachment compaction process.
pub const COMPACTION_PROCESS_SUFFIX: &str = "compact";

/// Phases of a compaction run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Mark,
    Sweep,
    Cleanup,
}

impl Phase {
    fn rank(self) -> u8 {
        match self {
            Phase::Mark => 0,
            Phase::Sweep => 1,
            Phase::Cleanup => 2,
        }
    }
}

upkeep_core::simple_display! {
    Phase {
        Mark => "mark",
        Sweep => "sweep",
        Cleanup => "cleanup",
    }
}

/// Status payload published by attachment compaction. Also the resumption
/// token read back by [`AttachmentCompactionProcess::init`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentCompactionStatus {
    #[serde(flatten)]
    pub envelope: StatusEnvelope,
    pub marked_attachments: i64,
    pub purged_attachments: i64,
    pub compact_id: String,
    /// Absent once a run has completed cleanly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

/// Resumable per-run state, guarded by the process lock because `phase` and
/// `compact_id` are not atomics.
#[derive(Debug, Clone, Default)]
struct CompactionRun {
    compact_id: String,
    phase: Option<Phase>,
    dry_run: bool,
}

pub struct AttachmentCompactionProcess {
    store: Arc<dyn AttachmentStore>,
    database: Arc<DatabaseState>,
    marked_attachments: AtomicI64,
    purged_attachments: AtomicI64,
    run: Mutex<CompactionRun>,
}

impl AttachmentCompactionProcess {
    pub fn new(store: Arc<dyn AttachmentStore>, database: Arc<DatabaseState>) -> Self {
        Self {
            store,
            database,
            marked_attachments: AtomicI64::new(0),
            purged_attachments: AtomicI64::new(0),
            run: Mutex::new(CompactionRun::default()),
        }
    }

    /// ID of the current (or resumed) run.
    pub fn compact_id(&self) -> String {
        self.run.lock().compact_id.clone()
    }

    /// Phase the run has reached; `None` before mark and after cleanup.
    pub fn phase(&self) -> Option<Phase> {
        self.run.lock().phase
    }

    fn set_phase(&self, phase: Option<Phase>) {
        self.run.lock().phase = phase;
    }

    fn begin_fresh_run(&self, options: &RunOptions) {
        let mut run = self.run.lock();
        run.compact_id = Uuid::new_v4().to_string();
        run.phase = None;
        run.dry_run = options.dry_run;
        if run.dry_run {
            tracing::info!("attachment compaction: dry run, no attachments will be purged");
        }
        tracing::info!(compact_id = %run.compact_id, "attachment compaction: starting new run");
    }

    async fn run_phases(
        &self,
        persist_status: &StatusPersister,
        terminator: &Terminator,
    ) -> Result<(), ProcessError> {
        let (compact_id, resume_rank, dry_run) = {
            let run = self.run.lock();
            (run.compact_id.clone(), run.phase.map_or(0, Phase::rank), run.dry_run)
        };

        if resume_rank <= Phase::Mark.rank() {
            self.set_phase(Some(Phase::Mark));
            persist_status.persist_logged().await;
            self.store
                .mark_attachments(&compact_id, terminator, &self.marked_attachments)
                .await?;
            if terminator.is_closed() {
                return Ok(());
            }
        }

        if resume_rank <= Phase::Sweep.rank() {
            self.set_phase(Some(Phase::Sweep));
            persist_status.persist_logged().await;
            self.store
                .sweep_attachments(&compact_id, dry_run, terminator, &self.purged_attachments)
                .await?;
            if terminator.is_closed() {
                return Ok(());
            }
        }

        self.set_phase(Some(Phase::Cleanup));
        persist_status.persist_logged().await;
        self.store.cleanup_attachments(&compact_id, terminator).await?;
        if terminator.is_closed() {
            return Ok(());
        }

        // A cleared phase marks a clean completion; the next start begins fresh.
        self.set_phase(None);
        Ok(())
    }
}

/// Cluster-aware manager wired for attachment compaction.
pub fn new_attachment_compaction_manager(
    store: Arc<dyn AttachmentStore>,
    database: Arc<DatabaseState>,
    bucket: Arc<dyn Bucket>,
) -> BackgroundManager {
    BackgroundManager::clustered(
        Arc::new(AttachmentCompactionProcess::new(store, database)),
        ClusterOptions::new(bucket, COMPACTION_PROCESS_SUFFIX),
    )
}

#[async_trait]
impl BackgroundProcess for AttachmentCompactionProcess {
    async fn init(
        &self,
        options: &RunOptions,
        cluster_status: Option<&[u8]>,
    ) -> Result<(), ProcessError> {
        self.database.stamp_compaction_start(chrono::Utc::now().timestamp_millis() as u64);

        let Some(bytes) = cluster_status else {
            self.begin_fresh_run(options);
            return Ok(());
        };

        if options.reset {
            tracing::info!(
                "attachment compaction: resetting, will not resume a partially completed run"
            );
            self.begin_fresh_run(options);
            return Ok(());
        }

        match serde_json::from_slice::<AttachmentCompactionStatus>(bytes) {
            Ok(prior) if prior.envelope.state != ProcessState::Completed => {
                {
                    let mut run = self.run.lock();
                    run.compact_id = prior.compact_id;
                    run.phase = prior.phase;
                    run.dry_run = prior.dry_run;
                }
                self.marked_attachments.store(prior.marked_attachments, Ordering::SeqCst);
                self.purged_attachments.store(prior.purged_attachments, Ordering::SeqCst);
                let run = self.run.lock();
                tracing::info!(
                    compact_id = %run.compact_id,
                    phase = ?run.phase,
                    "attachment compaction: resuming prior run"
                );
            }
            // A completed prior run, or a status doc we cannot decode: start over.
            _ => self.begin_fresh_run(options),
        }
        Ok(())
    }

    async fn run(
        &self,
        _options: &RunOptions,
        persist_status: StatusPersister,
        terminator: Terminator,
    ) -> Result<(), ProcessError> {
        let result = self.run_phases(&persist_status, &terminator).await;
        // Final persist so the resumption token reflects where the run ended.
        persist_status.persist_logged().await;
        result
    }

    fn process_status(&self, envelope: StatusEnvelope) -> Result<Vec<u8>, ProcessError> {
        let run = self.run.lock();
        let status = AttachmentCompactionStatus {
            envelope,
            marked_attachments: self.marked_attachments.load(Ordering::SeqCst),
            purged_attachments: self.purged_attachments.load(Ordering::SeqCst),
            compact_id: run.compact_id.clone(),
            phase: run.phase,
            dry_run: run.dry_run,
        };
        Ok(serde_json::to_vec(&status)?)
    }

    fn reset_status(&self) {
        self.marked_attachments.store(0, Ordering::SeqCst);
        self.purged_attachments.store(0, Ordering::SeqCst);
        self.run.lock().dry_run = false;
    }
}

#[cfg(test)]
#[path = "attachment_tests.rs"]
mod tests;
