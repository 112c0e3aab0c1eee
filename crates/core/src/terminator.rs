// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot broadcast cancellation signal.

use tokio_util::sync::CancellationToken;

/// Cooperative cancellation handle shared by a run and its ancillary tasks.
///
/// Closing is idempotent and permanent: every `done()` waiter, past or
/// future, observes the close. Clones share the signal. A manager allocates
/// a fresh terminator per run; tasks capture their clone at spawn time.
#[derive(Clone, Debug, Default)]
pub struct Terminator {
    token: CancellationToken,
}

impl Terminator {
    pub fn new() -> Self {
        Self { token: CancellationToken::new() }
    }

    /// Signal cancellation. Safe to call from any task, any number of times.
    pub fn close(&self) {
        self.token.cancel();
    }

    /// Wait until the terminator is closed.
    pub async fn done(&self) {
        self.token.cancelled().await;
    }

    /// Non-blocking snapshot of the closed flag.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
#[path = "terminator_tests.rs"]
mod tests;
