// ABOUTME: Client-side controller for a long-running remote scraping job
// ABOUTME: Starts and stops the job, polls its status, and reconciles local lifecycle state

pub mod config;
pub mod error;
pub mod job;
pub mod remote;
pub mod ui;

pub use config::Config;
pub use error::JobError;
pub use job::{ControllerState, JobController, JobStatus, StateChange};
pub use remote::{JobService, RemoteClient};
