// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::BucketExt;
use std::time::Duration;
use upkeep_core::FakeClock;

fn bucket() -> (MemoryBucket<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    (MemoryBucket::with_clock(clock.clone()), clock)
}

#[tokio::test]
async fn get_missing_key_is_not_found() {
    let (bucket, _clock) = bucket();
    let err = bucket.get_raw("nope").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn create_only_write_fails_on_existing_key() {
    let (bucket, _clock) = bucket();
    bucket.write_cas("key", 0, 0, b"{}").await.unwrap();
    let err = bucket.write_cas("key", 0, 0, b"{}").await.unwrap_err();
    assert!(err.is_cas_mismatch());
}

#[tokio::test]
async fn cas_replace_succeeds_with_matching_cas() {
    let (bucket, _clock) = bucket();
    let cas = bucket.write_cas("key", 0, 0, b"v1").await.unwrap();
    let new_cas = bucket.write_cas("key", cas, 0, b"v2").await.unwrap();
    assert_ne!(cas, new_cas);

    let (bytes, read_cas) = bucket.get_raw("key").await.unwrap();
    assert_eq!(bytes, b"v2");
    assert_eq!(read_cas, new_cas);
}

#[tokio::test]
async fn cas_replace_fails_with_stale_cas() {
    let (bucket, _clock) = bucket();
    let cas = bucket.write_cas("key", 0, 0, b"v1").await.unwrap();
    bucket.write_cas("key", cas, 0, b"v2").await.unwrap();

    let err = bucket.write_cas("key", cas, 0, b"v3").await.unwrap_err();
    assert!(err.is_cas_mismatch());
}

#[tokio::test]
async fn cas_replace_of_missing_key_is_not_found() {
    let (bucket, _clock) = bucket();
    let err = bucket.write_cas("key", 99, 0, b"v").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn documents_expire_after_ttl() {
    let (bucket, clock) = bucket();
    bucket.write_cas("lease", 0, 30, b"{}").await.unwrap();
    assert!(bucket.contains_key("lease"));

    clock.advance(Duration::from_secs(29));
    assert!(bucket.contains_key("lease"));

    clock.advance(Duration::from_secs(2));
    assert!(!bucket.contains_key("lease"));
    assert!(bucket.get_raw("lease").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn expired_key_can_be_recreated_with_create_only_write() {
    let (bucket, clock) = bucket();
    bucket.write_cas("lease", 0, 30, b"{}").await.unwrap();
    clock.advance(Duration::from_secs(31));
    bucket.write_cas("lease", 0, 30, b"{}").await.unwrap();
}

#[tokio::test]
async fn touch_extends_expiry() {
    let (bucket, clock) = bucket();
    bucket.write_cas("lease", 0, 30, b"{}").await.unwrap();

    clock.advance(Duration::from_secs(20));
    bucket.get_and_touch_raw("lease", 30).await.unwrap();

    clock.advance(Duration::from_secs(20));
    assert!(bucket.contains_key("lease"));

    clock.advance(Duration::from_secs(11));
    assert!(!bucket.contains_key("lease"));
}

#[tokio::test]
async fn touch_of_missing_key_is_not_found() {
    let (bucket, _clock) = bucket();
    let err = bucket.get_and_touch_raw("nope", 30).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn set_raw_with_zero_ttl_never_expires() {
    let (bucket, clock) = bucket();
    bucket.set_raw("status", 0, b"{}").await.unwrap();
    clock.advance(Duration::from_secs(3600));
    assert!(bucket.contains_key("status"));
}

#[tokio::test]
async fn delete_removes_document() {
    let (bucket, _clock) = bucket();
    bucket.set_raw("doc", 0, b"{}").await.unwrap();
    bucket.delete("doc").await.unwrap();
    assert!(bucket.get_raw("doc").await.unwrap_err().is_not_found());
    assert!(bucket.delete("doc").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn set_json_writes_serialized_value() {
    #[derive(serde::Serialize)]
    struct Doc {
        should_stop: bool,
    }

    let (bucket, _clock) = bucket();
    bucket.set_json("doc", 0, &Doc { should_stop: true }).await.unwrap();
    let (bytes, _cas) = bucket.get_raw("doc").await.unwrap();
    assert_eq!(bytes, br#"{"should_stop":true}"#);
}
