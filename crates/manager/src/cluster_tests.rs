// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use upkeep_bucket::MemoryBucket;

fn options(suffix: &str) -> ClusterOptions {
    ClusterOptions::new(Arc::new(MemoryBucket::new()), suffix)
}

#[test]
fn heartbeat_doc_id_format() {
    let opts = options("compact");
    assert_eq!(opts.heartbeat_doc_id(), "_sync:background_process:heartbeat:compact");
}

#[test]
fn status_doc_id_format() {
    let opts = options("compact");
    assert_eq!(opts.status_doc_id(), "_sync:background_process:status:compact");
}

#[test]
fn defaults_match_protocol_constants() {
    let opts = options("resync");
    assert_eq!(opts.heartbeat_expiry_secs, 30);
    assert_eq!(opts.heartbeat_interval, Duration::from_secs(1));
    assert_eq!(opts.status_update_interval, Duration::from_secs(1));
}

#[test]
fn setters_override_cadence() {
    let opts = options("resync")
        .heartbeat_interval(Duration::from_millis(10))
        .status_update_interval(Duration::from_millis(20))
        .heartbeat_expiry_secs(5);
    assert_eq!(opts.heartbeat_interval, Duration::from_millis(10));
    assert_eq!(opts.status_update_interval, Duration::from_millis(20));
    assert_eq!(opts.heartbeat_expiry_secs, 5);
}

#[test]
fn grace_window_is_expiry_minus_interval() {
    let opts = options("resync");
    assert_eq!(opts.heartbeat_grace(), Duration::from_secs(29));
}

#[test]
fn heartbeat_doc_defaults_to_not_stopping() {
    let doc: HeartbeatDoc = serde_json::from_str("{}").unwrap();
    assert!(!doc.should_stop);

    let doc: HeartbeatDoc = serde_json::from_str(r#"{"should_stop":true}"#).unwrap();
    assert!(doc.should_stop);
}
