// ABOUTME: Boundary to the remote scraping service
// ABOUTME: Defines the JobService seam and its reqwest-backed implementation

pub mod client;
pub mod models;

use async_trait::async_trait;

use crate::error::JobError;
use crate::job::{JobCommandResult, JobStatus};

pub use client::RemoteClient;
pub use models::SampleUrl;

/// Consumed contract of the remote job service.
///
/// A rejected command (`success: false`) is returned as `Ok` with
/// `accepted == false`; only transport-level failures are `Err`.
#[async_trait]
pub trait JobService: Send + Sync + 'static {
    async fn start(&self, urls: &[String], max_workers: u32) -> Result<JobCommandResult, JobError>;

    async fn stop(&self) -> Result<JobCommandResult, JobError>;

    async fn status(&self) -> Result<JobStatus, JobError>;

    async fn sample_urls(&self) -> Result<Vec<SampleUrl>, JobError>;

    async fn download_results(&self) -> Result<Vec<u8>, JobError>;
}
