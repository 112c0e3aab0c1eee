// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake collaborators shared by the manager and process tests.

use crate::attachment::Phase;
use crate::error::ManagerError;
use crate::process::{BackgroundProcess, ProcessError, RunOptions, StatusPersister};
use crate::store::{
    AttachmentStore, PurgeProgress, ResyncProgress, ResyncStore, StoreError, TombstoneStore,
};
use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use upkeep_bucket::{Bucket, BucketError};
use upkeep_core::{StatusEnvelope, Terminator};

/// Poll `cond` until it holds, panicking after five seconds.
pub async fn wait_until<F: Fn() -> bool>(what: &str, cond: F) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {}", what);
}

/// Persister that drops the status on the floor, for driving a process
/// directly in tests.
pub fn noop_persister() -> StatusPersister {
    StatusPersister::new(Arc::new(|| async { Ok::<(), ManagerError>(()) }.boxed()))
}

/// Scan over `total_docs` fake documents, reporting progress per document.
///
/// With a gate set, the scan parks after the first document until the gate
/// is notified or the run is cancelled, letting tests stop a run mid-flight.
pub struct FakeResyncStore {
    pub total_docs: u64,
    pub changed_docs: u64,
    pub gate: Option<Arc<Notify>>,
    pub fail: Option<String>,
}

impl FakeResyncStore {
    pub fn completing(total_docs: u64, changed_docs: u64) -> Self {
        Self { total_docs, changed_docs, gate: None, fail: None }
    }

    pub fn gated(total_docs: u64, gate: Arc<Notify>) -> Self {
        Self { total_docs, changed_docs: 0, gate: Some(gate), fail: None }
    }

    pub fn failing(message: &str) -> Self {
        Self { total_docs: 1, changed_docs: 0, gate: None, fail: Some(message.to_string()) }
    }
}

#[async_trait]
impl ResyncStore for FakeResyncStore {
    async fn update_all_doc_channels(
        &self,
        _regenerate_sequences: bool,
        on_progress: ResyncProgress<'_>,
        terminator: &Terminator,
    ) -> Result<u64, StoreError> {
        let mut processed = 0;
        let mut changed = 0;
        for i in 0..self.total_docs {
            if terminator.is_closed() {
                break;
            }
            processed += 1;
            if i < self.changed_docs {
                changed += 1;
            }
            on_progress(processed, changed);
            if i == 0 {
                if let Some(gate) = &self.gate {
                    tokio::select! {
                        _ = gate.notified() => {}
                        _ = terminator.done() => {}
                    }
                }
            }
            tokio::task::yield_now().await;
        }
        if let Some(message) = &self.fail {
            return Err(StoreError::Backend(message.clone()));
        }
        Ok(processed)
    }
}

/// Purges a fixed number of tombstones in one batch.
pub struct FakeTombstoneStore {
    pub purge_count: u64,
}

#[async_trait]
impl TombstoneStore for FakeTombstoneStore {
    async fn purge_tombstones(
        &self,
        on_purge: PurgeProgress<'_>,
        _terminator: &Terminator,
    ) -> Result<u64, StoreError> {
        on_purge(self.purge_count);
        Ok(self.purge_count)
    }
}

/// Mark/sweep/cleanup fake that records which phases actually ran.
///
/// With a gate set, mark parks (after counting) until notified or cancelled.
/// `fail_in` makes the named phase return an error.
pub struct FakeAttachmentStore {
    pub marks: i64,
    pub sweeps: i64,
    pub gate: Option<Arc<Notify>>,
    pub fail_in: Option<Phase>,
    phases: Mutex<Vec<Phase>>,
}

impl FakeAttachmentStore {
    pub fn completing(marks: i64, sweeps: i64) -> Self {
        Self { marks, sweeps, gate: None, fail_in: None, phases: Mutex::new(Vec::new()) }
    }

    pub fn gated_in_mark(marks: i64, gate: Arc<Notify>) -> Self {
        Self { marks, sweeps: 0, gate: Some(gate), fail_in: None, phases: Mutex::new(Vec::new()) }
    }

    pub fn failing_in(phase: Phase) -> Self {
        Self { marks: 0, sweeps: 0, gate: None, fail_in: Some(phase), phases: Mutex::new(Vec::new()) }
    }

    pub fn phases_run(&self) -> Vec<Phase> {
        self.phases.lock().clone()
    }

    fn enter(&self, phase: Phase) -> Result<(), StoreError> {
        self.phases.lock().push(phase);
        if self.fail_in == Some(phase) {
            return Err(StoreError::Backend(format!("{} failed", phase)));
        }
        Ok(())
    }
}

#[async_trait]
impl AttachmentStore for FakeAttachmentStore {
    async fn mark_attachments(
        &self,
        _compact_id: &str,
        terminator: &Terminator,
        marked: &AtomicI64,
    ) -> Result<i64, StoreError> {
        self.enter(Phase::Mark)?;
        marked.fetch_add(self.marks, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            tokio::select! {
                _ = gate.notified() => {}
                _ = terminator.done() => {}
            }
        }
        Ok(marked.load(Ordering::SeqCst))
    }

    async fn sweep_attachments(
        &self,
        _compact_id: &str,
        _dry_run: bool,
        terminator: &Terminator,
        purged: &AtomicI64,
    ) -> Result<i64, StoreError> {
        self.enter(Phase::Sweep)?;
        if terminator.is_closed() {
            return Ok(purged.load(Ordering::SeqCst));
        }
        purged.fetch_add(self.sweeps, Ordering::SeqCst);
        Ok(purged.load(Ordering::SeqCst))
    }

    async fn cleanup_attachments(
        &self,
        _compact_id: &str,
        _terminator: &Terminator,
    ) -> Result<(), StoreError> {
        self.enter(Phase::Cleanup)?;
        Ok(())
    }
}

/// Process whose `init` fails on the first call, for exercising start
/// rollback.
pub struct FailingInitProcess {
    fail_next: AtomicBool,
}

impl FailingInitProcess {
    pub fn new() -> Self {
        Self { fail_next: AtomicBool::new(true) }
    }
}

#[async_trait]
impl BackgroundProcess for FailingInitProcess {
    async fn init(
        &self,
        _options: &RunOptions,
        _cluster_status: Option<&[u8]>,
    ) -> Result<(), ProcessError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ProcessError::Store(StoreError::Backend("init exploded".to_string())));
        }
        Ok(())
    }

    async fn run(
        &self,
        _options: &RunOptions,
        _persist_status: StatusPersister,
        _terminator: Terminator,
    ) -> Result<(), ProcessError> {
        Ok(())
    }

    fn process_status(&self, envelope: StatusEnvelope) -> Result<Vec<u8>, ProcessError> {
        Ok(serde_json::to_vec(&envelope)?)
    }

    fn reset_status(&self) {}
}

/// Bucket wrapper that injects touch failures, for grace-window tests.
pub struct FlakyBucket {
    inner: Arc<dyn Bucket>,
    fail_touch: AtomicBool,
}

impl FlakyBucket {
    pub fn new(inner: Arc<dyn Bucket>) -> Self {
        Self { inner, fail_touch: AtomicBool::new(false) }
    }

    pub fn set_fail_touch(&self, fail: bool) {
        self.fail_touch.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Bucket for FlakyBucket {
    async fn get_raw(&self, key: &str) -> Result<(Vec<u8>, u64), BucketError> {
        self.inner.get_raw(key).await
    }

    async fn write_cas(
        &self,
        key: &str,
        cas: u64,
        ttl_secs: u32,
        bytes: &[u8],
    ) -> Result<u64, BucketError> {
        self.inner.write_cas(key, cas, ttl_secs, bytes).await
    }

    async fn set_raw(&self, key: &str, ttl_secs: u32, bytes: &[u8]) -> Result<(), BucketError> {
        self.inner.set_raw(key, ttl_secs, bytes).await
    }

    async fn delete(&self, key: &str) -> Result<(), BucketError> {
        self.inner.delete(key).await
    }

    async fn get_and_touch_raw(
        &self,
        key: &str,
        ttl_secs: u32,
    ) -> Result<(Vec<u8>, u64), BucketError> {
        if self.fail_touch.load(Ordering::SeqCst) {
            return Err(BucketError::Io("injected touch failure".to_string()));
        }
        self.inner.get_and_touch_raw(key, ttl_secs).await
    }
}
