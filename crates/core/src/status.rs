// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process lifecycle states and the shared status envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a managed background process.
///
/// `Stopping` means a stop was requested and the run will exit after its
/// current iteration; `Stopped` means the run exited early, by request or by
/// crash. A manager that has never run reports `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Running,
    #[default]
    Completed,
    Stopping,
    Stopped,
    Error,
}

impl ProcessState {
    /// True once the run can no longer make progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Completed | ProcessState::Stopped | ProcessState::Error)
    }
}

crate::simple_display! {
    ProcessState {
        Running => "running",
        Completed => "completed",
        Stopping => "stopping",
        Stopped => "stopped",
        Error => "error",
    }
}

/// Common header shared by every published process status.
///
/// Concrete processes embed this via `#[serde(flatten)]` and merge their own
/// counters alongside it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusEnvelope {
    #[serde(rename = "status", default)]
    pub state: ProcessState,
    /// Set at the most recent start; absent until the first run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Empty when the most recent run did not fail.
    #[serde(default)]
    pub last_error: String,
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
