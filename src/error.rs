// ABOUTME: Error taxonomy for driving the remote scraping job
// ABOUTME: Separates local validation, service rejections, and transport failures

use std::fmt;

use crate::job::ControllerState;

#[derive(Debug, Clone, PartialEq)]
pub enum JobError {
    /// Bad or empty local input. Never reaches the network.
    Validation(String),
    /// The service answered `success: false` to a start or stop request.
    CommandRejected(String),
    /// Network, HTTP status, or payload decoding failure.
    Transport(String),
    /// The command is not defined from the controller's current state.
    InvalidState {
        command: &'static str,
        state: ControllerState,
    },
    /// Another start or stop request has not resolved yet.
    CommandInFlight,
}

impl JobError {
    pub fn transport(context: &str, err: impl fmt::Display) -> Self {
        JobError::Transport(format!("{}: {}", context, err))
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobError::Validation(msg) => write!(f, "Validation error: {}", msg),
            JobError::CommandRejected(msg) => write!(f, "Command rejected: {}", msg),
            JobError::Transport(msg) => write!(f, "Transport error: {}", msg),
            JobError::InvalidState { command, state } => {
                write!(f, "Cannot {} while the job is {}", command, state)
            }
            JobError::CommandInFlight => {
                write!(f, "Another start/stop request is still in flight")
            }
        }
    }
}

impl std::error::Error for JobError {}
