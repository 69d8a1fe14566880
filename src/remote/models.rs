// ABOUTME: Wire payloads exchanged with the remote scraping service
// ABOUTME: Serialized to JSON and converted into the controller's own types

use serde::{Deserialize, Serialize};

use crate::job::{JobCommandResult, JobResults, JobStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub urls: Vec<String>,
    pub max_workers: u32,
}

/// Reply to both `start_scraping` and `stop_scraping`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    pub urls_count: Option<u32>,
    pub message: Option<String>,
}

impl From<CommandResponse> for JobCommandResult {
    fn from(resp: CommandResponse) -> Self {
        JobCommandResult {
            accepted: resp.success,
            accepted_count: resp.urls_count,
            message: resp.message,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub is_running: bool,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub current_task: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    // The service reports `{}` before the first run finishes.
    #[serde(default)]
    pub results: Option<ResultsPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultsPayload {
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub series_count: u64,
    #[serde(default)]
    pub products_count: u64,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl From<ResultsPayload> for JobResults {
    fn from(r: ResultsPayload) -> Self {
        JobResults {
            success_count: r.success_count,
            error_count: r.error_count,
            series_count: r.series_count,
            products_count: r.products_count,
            duration_secs: r.duration,
        }
    }
}

impl From<StatusResponse> for JobStatus {
    fn from(resp: StatusResponse) -> Self {
        JobStatus {
            is_running: resp.is_running,
            progress_percent: resp.progress.clamp(0.0, 100.0),
            current_task: resp.current_task.filter(|t| !t.is_empty()),
            error: resp.error,
            results: resp.results.map(JobResults::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleUrl {
    pub name: String,
    pub description: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Option<f64>,
    pub version: Option<String>,
}
