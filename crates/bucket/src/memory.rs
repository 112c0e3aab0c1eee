// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory bucket with real TTL and CAS semantics.
//!
//! The clock is injected so tests can expire documents by advancing a
//! [`FakeClock`](upkeep_core::FakeClock) instead of sleeping.

use crate::{Bucket, BucketError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use upkeep_core::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct Entry {
    bytes: Vec<u8>,
    cas: u64,
    /// Absolute expiry in epoch milliseconds; `None` means no expiry.
    expires_at_ms: Option<u64>,
}

#[derive(Default)]
struct Shared {
    entries: HashMap<String, Entry>,
    next_cas: u64,
}

impl Shared {
    fn next_cas(&mut self) -> u64 {
        self.next_cas += 1;
        self.next_cas
    }

    /// Drop the entry if its TTL has elapsed, then return what remains.
    fn live_entry(&mut self, key: &str, now_ms: u64) -> Option<&mut Entry> {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.expires_at_ms.is_some_and(|at| at <= now_ms));
        if expired {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }
}

/// A bucket held entirely in process memory.
pub struct MemoryBucket<C: Clock = SystemClock> {
    shared: Mutex<Shared>,
    clock: C,
}

impl MemoryBucket {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryBucket<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { shared: Mutex::new(Shared::default()), clock }
    }

    /// True if the key exists and has not expired.
    pub fn contains_key(&self, key: &str) -> bool {
        let now_ms = self.clock.epoch_ms();
        self.shared.lock().live_entry(key, now_ms).is_some()
    }

    fn expiry(&self, ttl_secs: u32) -> Option<u64> {
        (ttl_secs > 0).then(|| self.clock.epoch_ms() + u64::from(ttl_secs) * 1_000)
    }
}

#[async_trait]
impl<C: Clock + 'static> Bucket for MemoryBucket<C> {
    async fn get_raw(&self, key: &str) -> Result<(Vec<u8>, u64), BucketError> {
        let now_ms = self.clock.epoch_ms();
        let mut shared = self.shared.lock();
        let entry = shared.live_entry(key, now_ms).ok_or(BucketError::NotFound)?;
        Ok((entry.bytes.clone(), entry.cas))
    }

    async fn write_cas(
        &self,
        key: &str,
        cas: u64,
        ttl_secs: u32,
        bytes: &[u8],
    ) -> Result<u64, BucketError> {
        let now_ms = self.clock.epoch_ms();
        let expires_at_ms = self.expiry(ttl_secs);
        let mut shared = self.shared.lock();
        match shared.live_entry(key, now_ms) {
            Some(entry) => {
                if cas == 0 || cas != entry.cas {
                    return Err(BucketError::CasMismatch);
                }
            }
            None => {
                if cas != 0 {
                    return Err(BucketError::NotFound);
                }
            }
        }
        let new_cas = shared.next_cas();
        shared
            .entries
            .insert(key.to_string(), Entry { bytes: bytes.to_vec(), cas: new_cas, expires_at_ms });
        Ok(new_cas)
    }

    async fn set_raw(&self, key: &str, ttl_secs: u32, bytes: &[u8]) -> Result<(), BucketError> {
        let expires_at_ms = self.expiry(ttl_secs);
        let mut shared = self.shared.lock();
        let new_cas = shared.next_cas();
        shared
            .entries
            .insert(key.to_string(), Entry { bytes: bytes.to_vec(), cas: new_cas, expires_at_ms });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BucketError> {
        let now_ms = self.clock.epoch_ms();
        let mut shared = self.shared.lock();
        if shared.live_entry(key, now_ms).is_none() {
            return Err(BucketError::NotFound);
        }
        shared.entries.remove(key);
        Ok(())
    }

    async fn get_and_touch_raw(
        &self,
        key: &str,
        ttl_secs: u32,
    ) -> Result<(Vec<u8>, u64), BucketError> {
        let now_ms = self.clock.epoch_ms();
        let expires_at_ms = self.expiry(ttl_secs);
        let mut shared = self.shared.lock();
        if shared.live_entry(key, now_ms).is_none() {
            return Err(BucketError::NotFound);
        }
        let new_cas = shared.next_cas();
        let entry = match shared.entries.get_mut(key) {
            Some(entry) => entry,
            None => return Err(BucketError::NotFound),
        };
        entry.expires_at_ms = expires_at_ms;
        entry.cas = new_cas;
        Ok((entry.bytes.clone(), entry.cas))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
