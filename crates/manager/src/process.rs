// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pluggable process contract.

use crate::error::ManagerError;
use crate::store::StoreError;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;
use upkeep_core::{StatusEnvelope, Terminator};

/// Errors surfaced by a process body.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("status encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Per-run options passed to [`BackgroundManager::start`](crate::BackgroundManager::start)
/// and forwarded to the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Resync only: regenerate document sequences while rescanning.
    pub regenerate_sequences: bool,
    /// Attachment compaction only: report what would be purged, purge nothing.
    pub dry_run: bool,
    /// Attachment compaction only: discard prior resumable state and start a
    /// fresh run.
    pub reset: bool,
}

/// Handle a process uses to push the current status document to the cluster
/// at phase boundaries, outside the publisher's regular cadence.
#[derive(Clone)]
pub struct StatusPersister {
    inner: Arc<dyn Fn() -> BoxFuture<'static, Result<(), ManagerError>> + Send + Sync>,
}

impl StatusPersister {
    pub(crate) fn new(
        inner: Arc<dyn Fn() -> BoxFuture<'static, Result<(), ManagerError>> + Send + Sync>,
    ) -> Self {
        Self { inner }
    }

    pub async fn persist(&self) -> Result<(), ManagerError> {
        (self.inner.as_ref())().await
    }

    /// Persist, demoting failure to a warning. Phase boundaries must not
    /// abort the run because one status write was lost.
    pub async fn persist_logged(&self) {
        if let Err(err) = self.persist().await {
            tracing::warn!(error = %err, "failed to persist process status");
        }
    }
}

/// Capability set implemented by every concrete background process.
///
/// The manager composes exactly one process and drives it through
/// `init` → `run`; `process_status` and `reset_status` may be called at any
/// time, concurrently with a live run.
#[async_trait]
pub trait BackgroundProcess: Send + Sync {
    /// Called inside `start`, after the lease is claimed and the state is
    /// running. `cluster_status` carries the prior status document when one
    /// exists, letting a resumable process pick up where the last run died.
    async fn init(
        &self,
        options: &RunOptions,
        cluster_status: Option<&[u8]>,
    ) -> Result<(), ProcessError>;

    /// The work body. May block for hours; must poll
    /// `terminator.is_closed()` between units of work and persist status at
    /// phase boundaries. Returning `Ok` with the terminator closed reports
    /// the run as stopped rather than completed.
    async fn run(
        &self,
        options: &RunOptions,
        persist_status: StatusPersister,
        terminator: Terminator,
    ) -> Result<(), ProcessError>;

    /// Serialize the envelope merged with process-specific counters.
    fn process_status(&self, envelope: StatusEnvelope) -> Result<Vec<u8>, ProcessError>;

    /// Clear counters ahead of a new run.
    fn reset_status(&self);
}
