// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[tokio::test]
async fn starts_open() {
    let terminator = Terminator::new();
    assert!(!terminator.is_closed());
}

#[tokio::test]
async fn close_is_observable() {
    let terminator = Terminator::new();
    terminator.close();
    assert!(terminator.is_closed());
}

#[tokio::test]
async fn close_is_idempotent() {
    let terminator = Terminator::new();
    terminator.close();
    terminator.close();
    assert!(terminator.is_closed());
}

#[tokio::test]
async fn done_fires_for_waiter_registered_before_close() {
    let terminator = Terminator::new();
    let waiter = terminator.clone();
    let handle = tokio::spawn(async move { waiter.done().await });

    terminator.close();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("waiter should observe close")
        .unwrap();
}

#[tokio::test]
async fn done_fires_immediately_after_close() {
    let terminator = Terminator::new();
    terminator.close();
    tokio::time::timeout(Duration::from_secs(1), terminator.done())
        .await
        .expect("done should resolve after close");
}

#[tokio::test]
async fn clones_share_the_signal() {
    let terminator = Terminator::new();
    let clone = terminator.clone();
    clone.close();
    assert!(terminator.is_closed());
    terminator.done().await;
}

#[tokio::test]
async fn many_waiters_all_observe_close() {
    let terminator = Terminator::new();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let waiter = terminator.clone();
        handles.push(tokio::spawn(async move { waiter.done().await }));
    }

    terminator.close();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("every waiter should observe close")
            .unwrap();
    }
}
