// ABOUTME: HTTP client for the remote scraping service API
// ABOUTME: Maps transport, status-code, and decoding failures onto JobError::Transport

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::models::{
    CommandResponse, ErrorBody, HealthResponse, SampleUrl, StartRequest, StatusResponse,
};
use super::JobService;
use crate::error::JobError;
use crate::job::{JobCommandResult, JobStatus};

pub struct RemoteClient {
    client: Client,
    api_base_url: String,
}

impl RemoteClient {
    pub fn new(api_base_url: impl Into<String>, timeout: Duration) -> Result<Self, JobError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| JobError::transport("Failed to create HTTP client", e))?;

        let api_base_url = api_base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            api_base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.api_base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    pub async fn health(&self) -> Result<HealthResponse, JobError> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| JobError::transport("Health check failed", e))?;

        decode(response, "health check").await
    }
}

/// Rejects non-2xx replies, then decodes the JSON body.
async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, JobError> {
    let response = ensure_success(response, what).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| JobError::transport(&format!("Failed to parse {} response", what), e))
}

async fn ensure_success(response: Response, what: &str) -> Result<Response, JobError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(JobError::Transport(format!(
            "{} failed with status {}: {}",
            what, status, body
        )));
    }
    Ok(response)
}

#[async_trait]
impl JobService for RemoteClient {
    async fn start(&self, urls: &[String], max_workers: u32) -> Result<JobCommandResult, JobError> {
        let body = StartRequest {
            urls: urls.to_vec(),
            max_workers,
        };
        debug!(count = urls.len(), max_workers, "Submitting start request");

        let response = self
            .client
            .post(self.url("/api/start_scraping"))
            .json(&body)
            .send()
            .await
            .map_err(|e| JobError::transport("Failed to reach the scraping service", e))?;

        let reply: CommandResponse = decode(response, "start").await?;
        Ok(reply.into())
    }

    async fn stop(&self) -> Result<JobCommandResult, JobError> {
        let response = self
            .client
            .post(self.url("/api/stop_scraping"))
            .send()
            .await
            .map_err(|e| JobError::transport("Failed to reach the scraping service", e))?;

        let reply: CommandResponse = decode(response, "stop").await?;
        Ok(reply.into())
    }

    async fn status(&self) -> Result<JobStatus, JobError> {
        let response = self
            .client
            .get(self.url("/api/scraping_status"))
            .send()
            .await
            .map_err(|e| JobError::transport("Failed to get job status", e))?;

        let status: StatusResponse = decode(response, "status").await?;
        Ok(status.into())
    }

    async fn sample_urls(&self) -> Result<Vec<SampleUrl>, JobError> {
        let response = self
            .client
            .get(self.url("/api/sample_urls"))
            .send()
            .await
            .map_err(|e| JobError::transport("Failed to load sample URLs", e))?;

        decode(response, "sample URL").await
    }

    async fn download_results(&self) -> Result<Vec<u8>, JobError> {
        let response = self
            .client
            .get(self.url("/api/download_results"))
            .send()
            .await
            .map_err(|e| JobError::transport("Failed to download results", e))?;

        let response = ensure_success(response, "download").await?;

        // The service answers with a JSON body instead of the artifact when
        // there is nothing to download.
        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            let body: ErrorBody = response
                .json()
                .await
                .map_err(|e| JobError::transport("Failed to parse download response", e))?;
            return Err(JobError::CommandRejected(
                body.message.unwrap_or_else(|| "no results available".to_string()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| JobError::transport("Failed to read download body", e))?;
        Ok(bytes.to_vec())
    }
}
