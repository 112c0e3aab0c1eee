// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded retry with doubling backoff.

use std::future::Future;
use std::time::Duration;

/// Run `op` up to `attempts` times, sleeping `base_delay` (doubled after
/// each failure) between tries. Returns the first success or the last error.
///
/// `attempts` of zero still runs the operation once.
pub async fn with_backoff<T, E, Op, Fut>(
    label: &str,
    attempts: u32,
    base_delay: Duration,
    mut op: Op,
) -> Result<T, E>
where
    E: std::fmt::Display,
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = base_delay;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                tracing::debug!(label, attempt, error = %err, "retrying after backoff");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
