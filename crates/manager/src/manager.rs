// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The background process manager: lifecycle state machine, cluster leasing,
//! heartbeat renewal, and status publication.

use crate::cluster::{
    ClusterOptions, HeartbeatDoc, STATUS_PUBLISH_ATTEMPTS, STATUS_PUBLISH_BASE_DELAY,
};
use crate::error::ManagerError;
use crate::process::{BackgroundProcess, RunOptions, StatusPersister};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use upkeep_bucket::{Bucket, BucketExt};
use upkeep_core::{retry, Clock, ProcessState, StatusEnvelope, SystemClock, Terminator};

/// Locally-held status fields, guarded by the manager lock.
///
/// `state` is `None` until the first start; readers treat that as completed.
#[derive(Default)]
struct RunStatus {
    state: Option<ProcessState>,
    start_time: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

struct ManagerInner<C: Clock> {
    // Lock order: status before terminator.
    status: Mutex<RunStatus>,
    terminator: Mutex<Terminator>,
    process: Arc<dyn BackgroundProcess>,
    cluster: Option<ClusterOptions>,
    clock: C,
}

/// Coordinates a single named background process on this node.
///
/// Created at database open and start/stop cycled many times over its life.
/// Cheap to clone; clones share the same state. In cluster mode the manager
/// claims a TTL lease in the shared bucket before running, so at most one
/// node runs the process at a time, and publishes status so any node can
/// report on or stop the run.
pub struct BackgroundManager<C: Clock = SystemClock> {
    inner: Arc<ManagerInner<C>>,
}

impl<C: Clock> Clone for BackgroundManager<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl BackgroundManager {
    /// Manager for a process confined to this node.
    pub fn local(process: Arc<dyn BackgroundProcess>) -> Self {
        Self::with_clock(process, None, SystemClock)
    }

    /// Cluster-aware manager: mutual exclusion and status reporting go
    /// through the bucket named in `cluster`.
    pub fn clustered(process: Arc<dyn BackgroundProcess>, cluster: ClusterOptions) -> Self {
        Self::with_clock(process, Some(cluster), SystemClock)
    }
}

impl<C: Clock + 'static> BackgroundManager<C> {
    pub fn with_clock(
        process: Arc<dyn BackgroundProcess>,
        cluster: Option<ClusterOptions>,
        clock: C,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                status: Mutex::new(RunStatus::default()),
                terminator: Mutex::new(Terminator::new()),
                process,
                cluster,
                clock,
            }),
        }
    }

    fn is_cluster_aware(&self) -> bool {
        self.inner.cluster.is_some()
    }

    /// Snapshot of the locally-held state. `None` until the first start.
    pub fn run_state(&self) -> Option<ProcessState> {
        self.inner.status.lock().state
    }

    /// Message of the most recent terminal error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.inner.status.lock().last_error.clone()
    }

    /// Start the process.
    ///
    /// Claims the lease (cluster mode) or the local state slot, initializes
    /// the process with any prior resumable status, then spawns the run task
    /// and, in cluster mode, the status publisher. Returns once the run is
    /// launched; callers may immediately `get_status` or `stop`.
    pub async fn start(&self, options: RunOptions) -> Result<(), ManagerError> {
        self.mark_start().await?;

        let mut prior_status: Option<Vec<u8>> = None;
        if let Some(cluster) = &self.inner.cluster {
            match cluster.bucket.get_raw(&cluster.status_doc_id()).await {
                Ok((bytes, _cas)) => prior_status = Some(bytes),
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    self.abort_start().await;
                    return Err(ManagerError::ReadStatus(err));
                }
            }
        }

        {
            let mut status = self.inner.status.lock();
            status.last_error = None;
            status.start_time = Some(self.inner.clock.now_utc());
        }
        self.inner.process.reset_status();

        if let Err(err) = self.inner.process.init(&options, prior_status.as_deref()).await {
            self.abort_start().await;
            return Err(ManagerError::Init(err));
        }

        let terminator = self.inner.terminator.lock().clone();

        if self.is_cluster_aware() {
            self.spawn_status_publisher(terminator.clone());
        }

        self.spawn_run(options, terminator);

        if self.is_cluster_aware() {
            if let Err(err) = self.update_status_cluster_aware().await {
                tracing::error!(error = %err, "failed to publish initial status");
            }
        }

        Ok(())
    }

    /// Claim exclusive ownership of the process.
    ///
    /// Cluster mode creates the heartbeat lease (create-only CAS with TTL)
    /// and spawns the renewer; local mode gates on the in-memory state.
    async fn mark_start(&self) -> Result<(), ManagerError> {
        if let Some(cluster) = &self.inner.cluster {
            let created = cluster
                .bucket
                .write_cas(&cluster.heartbeat_doc_id(), 0, cluster.heartbeat_expiry_secs, b"{}")
                .await;
            match created {
                Ok(_cas) => {}
                Err(err) if err.is_cas_mismatch() => return Err(ManagerError::AlreadyRunning),
                Err(err) => return Err(err.into()),
            }

            // The lease write itself counts as a successful heartbeat.
            cluster
                .last_successful_heartbeat_ms
                .store(self.inner.clock.epoch_ms(), Ordering::SeqCst);

            let terminator = Terminator::new();
            *self.inner.terminator.lock() = terminator.clone();
            self.spawn_heartbeat(terminator);
            self.inner.status.lock().state = Some(ProcessState::Running);
            return Ok(());
        }

        let mut status = self.inner.status.lock();
        match status.state {
            Some(ProcessState::Running) => Err(ManagerError::AlreadyRunning),
            Some(ProcessState::Stopping) => Err(ManagerError::StoppingInProgress),
            _ => {
                *self.inner.terminator.lock() = Terminator::new();
                status.state = Some(ProcessState::Running);
                Ok(())
            }
        }
    }

    /// Roll back a failed start: stop the heartbeat renewer and, in cluster
    /// mode, release the lease so another node need not wait out the TTL.
    /// The state stays running; only an explicit stop moves it on.
    async fn abort_start(&self) {
        let terminator = self.inner.terminator.lock().clone();
        terminator.close();
        if let Some(cluster) = &self.inner.cluster {
            let _ = cluster.bucket.delete(&cluster.heartbeat_doc_id()).await;
        }
    }

    /// Request a cooperative stop.
    ///
    /// On the runner this transitions to stopping and closes the terminator.
    /// On any other cluster node it flags `should_stop` in the heartbeat
    /// document; the runner observes the flag within one heartbeat interval.
    pub async fn stop(&self) -> Result<(), ManagerError> {
        self.mark_stop().await?;
        self.terminate();
        Ok(())
    }

    pub(crate) fn terminate(&self) {
        self.inner.terminator.lock().clone().close();
    }

    async fn mark_stop(&self) -> Result<(), ManagerError> {
        if let Some(cluster) = &self.inner.cluster {
            match cluster.bucket.get_raw(&cluster.heartbeat_doc_id()).await {
                Ok(_) => {}
                Err(err) if err.is_not_found() => return Err(ManagerError::AlreadyStopped),
                Err(err) => return Err(ManagerError::VerifyRunning(err)),
            }

            let doc = HeartbeatDoc { should_stop: true };
            cluster
                .bucket
                .set_json(&cluster.heartbeat_doc_id(), cluster.heartbeat_expiry_secs, &doc)
                .await
                .map_err(ManagerError::MarkStopping)?;

            // Only the runner transitions; other nodes just flagged the doc.
            let mut status = self.inner.status.lock();
            if status.state == Some(ProcessState::Running) {
                status.state = Some(ProcessState::Stopping);
            }
            return Ok(());
        }

        let mut status = self.inner.status.lock();
        match status.state.unwrap_or_default() {
            ProcessState::Stopping => Err(ManagerError::AlreadyStopping),
            ProcessState::Completed | ProcessState::Stopped | ProcessState::Error => {
                Err(ManagerError::AlreadyStopped)
            }
            ProcessState::Running => {
                status.state = Some(ProcessState::Stopping);
                Ok(())
            }
        }
    }

    /// Record a terminal error and cancel the run.
    fn set_error(&self, err: &dyn std::fmt::Display) {
        {
            let mut status = self.inner.status.lock();
            status.last_error = Some(err.to_string());
            status.state = Some(ProcessState::Error);
        }
        self.terminate();
    }

    fn spawn_run(&self, options: RunOptions, terminator: Terminator) {
        let manager = self.clone();
        let persist = self.status_persister();
        tokio::spawn(async move {
            let result =
                manager.inner.process.run(&options, persist, terminator.clone()).await;
            if let Err(err) = result {
                tracing::error!(error = %err, "background process failed");
                manager.set_error(&err);
            }

            terminator.close();

            {
                let mut status = manager.inner.status.lock();
                match status.state {
                    Some(ProcessState::Stopping) => status.state = Some(ProcessState::Stopped),
                    Some(ProcessState::Error) => {}
                    _ => status.state = Some(ProcessState::Completed),
                }
            }

            if let Some(cluster) = &manager.inner.cluster {
                if let Err(err) = manager.update_status_cluster_aware().await {
                    tracing::warn!(error = %err, "failed to publish final status");
                }
                // Release the lease. Failure is ignored: worst case the next
                // run waits out the heartbeat TTL.
                let _ = cluster.bucket.delete(&cluster.heartbeat_doc_id()).await;
            }
        });
    }

    fn spawn_status_publisher(&self, terminator: Terminator) {
        let Some(cluster) = &self.inner.cluster else { return };
        let period = cluster.status_update_interval;
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = manager.update_status_cluster_aware().await {
                            tracing::warn!(error = %err, "failed to publish process status");
                        }
                    }
                    _ = terminator.done() => return,
                }
            }
        });
    }

    fn spawn_heartbeat(&self, terminator: Terminator) {
        let Some(cluster) = &self.inner.cluster else { return };
        let period = cluster.heartbeat_interval;
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = manager.renew_heartbeat(&terminator).await {
                            tracing::error!(error = %err, "failed to update expiry on heartbeat doc");
                            manager.set_error(&err);
                        }
                    }
                    _ = terminator.done() => return,
                }
            }
        });
    }

    /// One heartbeat tick: touch the lease, honor a cross-node stop flag.
    ///
    /// Transient failures are swallowed while the last successful renewal is
    /// within the grace window; beyond it the lease may already have lapsed
    /// on the server, so the error is fatal to the run.
    async fn renew_heartbeat(&self, terminator: &Terminator) -> Result<(), ManagerError> {
        let Some(cluster) = &self.inner.cluster else { return Ok(()) };

        let touched = cluster
            .bucket
            .get_and_touch_raw(&cluster.heartbeat_doc_id(), cluster.heartbeat_expiry_secs)
            .await;
        let raw = match touched {
            Ok((raw, _cas)) => raw,
            Err(err) => {
                // Our own shutdown deletes the doc; a late tick may race it.
                if err.is_not_found() && terminator.is_closed() {
                    return Ok(());
                }

                let last_ms = cluster.last_successful_heartbeat_ms.load(Ordering::SeqCst);
                let elapsed_ms = self.inner.clock.epoch_ms().saturating_sub(last_ms);
                if elapsed_ms > cluster.heartbeat_grace().as_millis() as u64 {
                    return Err(err.into());
                }
                return Ok(());
            }
        };

        let doc: HeartbeatDoc = serde_json::from_slice(&raw)?;
        if doc.should_stop {
            if let Err(err) = self.stop().await {
                tracing::warn!(
                    process = %cluster.process_suffix,
                    error = %err,
                    "failed to stop process"
                );
            }
        }

        cluster
            .last_successful_heartbeat_ms
            .store(self.inner.clock.epoch_ms(), Ordering::SeqCst);
        Ok(())
    }

    /// Current status as serialized JSON.
    ///
    /// Cluster mode prefers the shared status document and self-heals it: a
    /// document claiming a live run with no heartbeat behind it belongs to a
    /// crashed runner and is rewritten as stopped.
    pub async fn get_status(&self) -> Result<Vec<u8>, ManagerError> {
        if self.is_cluster_aware() {
            if let Some(status) = self.status_from_cluster().await? {
                return Ok(status);
            }
            // Nothing published yet: fall through to the initial local envelope.
        }
        self.status_local()
    }

    fn status_local(&self) -> Result<Vec<u8>, ManagerError> {
        let envelope = {
            let status = self.inner.status.lock();
            StatusEnvelope {
                state: status.state.unwrap_or_default(),
                start_time: status.start_time,
                last_error: status.last_error.clone().unwrap_or_default(),
            }
        };
        Ok(self.inner.process.process_status(envelope)?)
    }

    async fn status_from_cluster(&self) -> Result<Option<Vec<u8>>, ManagerError> {
        let Some(cluster) = &self.inner.cluster else { return Ok(None) };

        let (raw, cas) = match cluster.bucket.get_raw(&cluster.status_doc_id()).await {
            Ok(found) => found,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let mut doc: serde_json::Value = serde_json::from_slice(&raw)?;
        let reports_live = matches!(
            doc.get("status").and_then(|v| v.as_str()),
            Some("running") | Some("stopping")
        );
        if !reports_live {
            return Ok(Some(raw));
        }

        match cluster.bucket.get_raw(&cluster.heartbeat_doc_id()).await {
            Ok(_) => Ok(Some(raw)),
            Err(err) if err.is_not_found() => {
                // The runner died without cleaning up. Patch the document so
                // later readers skip this work; losing the CAS race just
                // means another reader already converged it.
                doc["status"] = serde_json::Value::from(ProcessState::Stopped.to_string());
                let patched = serde_json::to_vec(&doc)?;
                let _ = cluster
                    .bucket
                    .write_cas(&cluster.status_doc_id(), cas, 0, &patched)
                    .await;
                Ok(Some(patched))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Publish the local status to the shared status document, with bounded
    /// retry. No-op for local-mode managers.
    pub async fn update_status_cluster_aware(&self) -> Result<(), ManagerError> {
        let Some(cluster) = &self.inner.cluster else { return Ok(()) };

        retry::with_backoff(
            "publish_status",
            STATUS_PUBLISH_ATTEMPTS,
            STATUS_PUBLISH_BASE_DELAY,
            || async move {
                let status = self.status_local()?;
                cluster.bucket.set_raw(&cluster.status_doc_id(), 0, &status).await?;
                Ok(())
            },
        )
        .await
    }

    fn status_persister(&self) -> StatusPersister {
        let manager = self.clone();
        StatusPersister::new(Arc::new(move || {
            let manager = manager.clone();
            async move { manager.update_status_cluster_aware().await }.boxed()
        }))
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
