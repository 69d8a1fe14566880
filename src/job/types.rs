// ABOUTME: Value types shared by the controller, the poller, and renderers
// ABOUTME: Snapshots are immutable once received from the service

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    Idle,
    Running,
    Completed,
    Errored,
    Stopped,
}

impl ControllerState {
    pub fn is_running(&self) -> bool {
        matches!(self, ControllerState::Running)
    }

    /// `Completed`, `Errored` and `Stopped`: the remote job is no longer progressing.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ControllerState::Completed | ControllerState::Errored | ControllerState::Stopped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerState::Idle => "idle",
            ControllerState::Running => "running",
            ControllerState::Completed => "completed",
            ControllerState::Errored => "errored",
            ControllerState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a start or stop request.
#[derive(Debug, Clone, PartialEq)]
pub struct JobCommandResult {
    pub accepted: bool,
    pub accepted_count: Option<u32>,
    pub message: Option<String>,
}

impl JobCommandResult {
    pub fn accepted(accepted_count: Option<u32>, message: Option<String>) -> Self {
        Self {
            accepted: true,
            accepted_count,
            message,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            accepted_count: None,
            message: Some(message.into()),
        }
    }
}

/// Terminal-state summary reported once the job has produced output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResults {
    pub success_count: u64,
    pub error_count: u64,
    pub series_count: u64,
    pub products_count: u64,
    pub duration_secs: Option<f64>,
}

/// Snapshot of the remote job at poll time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub is_running: bool,
    pub progress_percent: f64,
    pub current_task: Option<String>,
    pub error: Option<String>,
    pub results: Option<JobResults>,
}

impl JobStatus {
    pub fn success_count(&self) -> u64 {
        self.results.as_ref().map(|r| r.success_count).unwrap_or(0)
    }
}

/// Emitted on every transition and every applied progress update.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub state: ControllerState,
    pub status: Option<JobStatus>,
    pub message: Option<String>,
}
