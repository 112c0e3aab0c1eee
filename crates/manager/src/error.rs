// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Caller-facing manager errors with HTTP status mapping.

use crate::process::ProcessError;
use thiserror::Error;
use upkeep_bucket::BucketError;

/// Errors returned by [`BackgroundManager`](crate::BackgroundManager)
/// operations. Administrative transports map these onto HTTP responses via
/// [`ManagerError::status_code`].
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Process already running")]
    AlreadyRunning,

    #[error("Process already stopping")]
    AlreadyStopping,

    #[error("Process already stopped")]
    AlreadyStopped,

    #[error("Process currently stopping. Wait until stopped to retry")]
    StoppingInProgress,

    /// Stop could not confirm whether a runner holds the lease.
    #[error("Unable to verify whether a process is running: {0}")]
    VerifyRunning(BucketError),

    #[error("Failed to mark process as stopping: {0}")]
    MarkStopping(BucketError),

    #[error("Failed to get current process status: {0}")]
    ReadStatus(BucketError),

    #[error("process init failed: {0}")]
    Init(ProcessError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Bucket(#[from] BucketError),

    #[error("status document decode failed: {0}")]
    Codec(#[from] serde_json::Error),
}

impl ManagerError {
    /// HTTP status code for administrative callers.
    pub fn status_code(&self) -> u16 {
        match self {
            ManagerError::AlreadyRunning
            | ManagerError::AlreadyStopping
            | ManagerError::AlreadyStopped
            | ManagerError::StoppingInProgress => 503,
            _ => 500,
        }
    }
}
