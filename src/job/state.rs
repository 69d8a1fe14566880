// ABOUTME: Pure transition function from a polled status to the next lifecycle state
// ABOUTME: Kept free of I/O so every poll rule is unit-testable

use super::types::{ControllerState, JobStatus};

impl ControllerState {
    /// Next state for a `Running` controller that just observed `status`.
    ///
    /// An error wins over any results; a finished run with no successful
    /// items is treated as stopped rather than completed.
    pub fn after_poll(status: &JobStatus) -> ControllerState {
        if status.is_running {
            ControllerState::Running
        } else if status.error.is_some() {
            ControllerState::Errored
        } else if status.success_count() > 0 {
            ControllerState::Completed
        } else {
            ControllerState::Stopped
        }
    }
}
