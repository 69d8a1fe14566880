// ABOUTME: Job lifecycle core: state machine, controller, and status polling
// ABOUTME: Everything that reconciles local belief with the remote job's lifecycle

pub mod controller;
pub mod state;
pub mod synchronizer;
pub mod types;
pub mod urls;

pub use controller::{ControllerOptions, JobController};
pub use synchronizer::{PollOptions, StatusSynchronizer};
pub use types::{ControllerState, JobCommandResult, JobResults, JobStatus, StateChange};
pub use urls::{UrlFilter, WorkerLimits};
