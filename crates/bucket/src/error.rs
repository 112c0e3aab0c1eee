// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error classification for bucket operations.

use thiserror::Error;

/// Errors surfaced by [`Bucket`](crate::Bucket) implementations.
///
/// Callers branch on the two classified variants; everything else is opaque
/// transport failure, retried or escalated by policy at the call site.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BucketError {
    /// The key does not exist (or its TTL has elapsed).
    #[error("key not found")]
    NotFound,

    /// A CAS write lost the race: the document changed since the read, or a
    /// create-only write found the key already present.
    #[error("cas mismatch")]
    CasMismatch,

    /// Transport or backend failure.
    #[error("bucket i/o failed: {0}")]
    Io(String),
}

impl BucketError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BucketError::NotFound)
    }

    pub fn is_cas_mismatch(&self) -> bool {
        matches!(self, BucketError::CasMismatch)
    }
}
