// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! upkeep-bucket: keyed blob store with CAS writes and timed expiration.
//!
//! The manager coordinates across a cluster through a shared bucket of raw
//! documents. The only primitives it needs are create-if-absent with TTL,
//! touch, and compare-and-set replace; everything else (leases, status
//! publication, self-healing reads) is built on top.

pub mod error;
pub mod memory;

pub use error::BucketError;
pub use memory::MemoryBucket;

use async_trait::async_trait;
use serde::Serialize;

/// Key prefix for metadata documents owned by the sync layer.
pub const SYNC_PREFIX: &str = "_sync";

/// A `ttl_secs` of zero means the document never expires.
#[async_trait]
pub trait Bucket: Send + Sync {
    /// Fetch a document's raw bytes and its current CAS value.
    async fn get_raw(&self, key: &str) -> Result<(Vec<u8>, u64), BucketError>;

    /// Compare-and-set write. A `cas` of zero means create-only: the write
    /// fails with [`BucketError::CasMismatch`] if the key already exists.
    /// Returns the document's new CAS value.
    async fn write_cas(
        &self,
        key: &str,
        cas: u64,
        ttl_secs: u32,
        bytes: &[u8],
    ) -> Result<u64, BucketError>;

    /// Unconditional upsert of raw bytes.
    async fn set_raw(&self, key: &str, ttl_secs: u32, bytes: &[u8]) -> Result<(), BucketError>;

    /// Remove a document.
    async fn delete(&self, key: &str) -> Result<(), BucketError>;

    /// Fetch a document and refresh its expiry in one operation.
    async fn get_and_touch_raw(
        &self,
        key: &str,
        ttl_secs: u32,
    ) -> Result<(Vec<u8>, u64), BucketError>;
}

/// JSON conveniences layered over the raw operations.
#[async_trait]
pub trait BucketExt: Bucket {
    /// Serialize `value` as JSON and upsert it.
    async fn set_json<T>(&self, key: &str, ttl_secs: u32, value: &T) -> Result<(), BucketError>
    where
        T: Serialize + Sync,
    {
        let bytes =
            serde_json::to_vec(value).map_err(|err| BucketError::Io(err.to_string()))?;
        self.set_raw(key, ttl_secs, &bytes).await
    }
}

impl<B: Bucket + ?Sized> BucketExt for B {}
