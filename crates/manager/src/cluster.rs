// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster-awareness configuration: the lease and status document keys and
//! the heartbeat cadence.

use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use upkeep_bucket::{Bucket, SYNC_PREFIX};

/// Maximum age of the heartbeat lease before another node may claim it.
pub const HEARTBEAT_EXPIRY_SECS: u32 = 30;

/// Cadence at which the runner refreshes the heartbeat lease.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Cadence at which the runner republishes the status document.
pub const STATUS_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// Bounded retry for status publication.
pub const STATUS_PUBLISH_ATTEMPTS: u32 = 5;
pub const STATUS_PUBLISH_BASE_DELAY: Duration = Duration::from_millis(100);

/// Body of the heartbeat lease document.
///
/// Any node may flip `should_stop`; the runner observes it within one
/// heartbeat interval and begins a cooperative stop.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HeartbeatDoc {
    #[serde(default)]
    pub should_stop: bool,
}

/// Options that make a [`BackgroundManager`](crate::BackgroundManager)
/// cluster-aware.
///
/// `process_suffix` names the process cluster-wide; every node managing the
/// same process over the same bucket must use the same suffix.
pub struct ClusterOptions {
    pub(crate) bucket: Arc<dyn Bucket>,
    pub(crate) process_suffix: String,
    pub(crate) heartbeat_expiry_secs: u32,
    pub(crate) heartbeat_interval: Duration,
    pub(crate) status_update_interval: Duration,
    /// Epoch ms of the last successful lease refresh; the grace window for
    /// transient bucket failures is measured from here.
    pub(crate) last_successful_heartbeat_ms: AtomicU64,
}

impl ClusterOptions {
    pub fn new(bucket: Arc<dyn Bucket>, process_suffix: impl Into<String>) -> Self {
        Self {
            bucket,
            process_suffix: process_suffix.into(),
            heartbeat_expiry_secs: HEARTBEAT_EXPIRY_SECS,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            status_update_interval: STATUS_UPDATE_INTERVAL,
            last_successful_heartbeat_ms: AtomicU64::new(0),
        }
    }

    upkeep_core::setters! {
        set {
            heartbeat_expiry_secs: u32,
            heartbeat_interval: Duration,
            status_update_interval: Duration,
        }
    }

    /// Key of the heartbeat lease document. Bit-exact across the cluster.
    pub fn heartbeat_doc_id(&self) -> String {
        format!("{}:background_process:heartbeat:{}", SYNC_PREFIX, self.process_suffix)
    }

    /// Key of the shared status document. Bit-exact across the cluster.
    pub fn status_doc_id(&self) -> String {
        format!("{}:background_process:status:{}", SYNC_PREFIX, self.process_suffix)
    }

    /// How long heartbeat renewal may keep failing before the runner must
    /// assume the lease has lapsed and another node could claim it.
    pub(crate) fn heartbeat_grace(&self) -> Duration {
        Duration::from_secs(u64::from(self.heartbeat_expiry_secs))
            .saturating_sub(self.heartbeat_interval)
    }
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod tests;
