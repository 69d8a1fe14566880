// ABOUTME: Local validation of start input: category URL lines and worker count
// ABOUTME: Rejections here happen before any request is sent

use crate::error::JobError;

pub const DEFAULT_REQUIRED_DOMAIN: &str = "fotek.com.tw";

#[derive(Debug, Clone)]
pub struct UrlFilter {
    required_domain: String,
}

impl Default for UrlFilter {
    fn default() -> Self {
        Self::new(DEFAULT_REQUIRED_DOMAIN)
    }
}

impl UrlFilter {
    pub fn new(required_domain: impl Into<String>) -> Self {
        Self {
            required_domain: required_domain.into(),
        }
    }

    /// Trimmed, non-empty lines containing the required domain, in input order.
    pub fn filter(&self, input: &str) -> Vec<String> {
        input
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && line.contains(self.required_domain.as_str()))
            .map(str::to_string)
            .collect()
    }

    pub fn validate(&self, input: &str) -> Result<Vec<String>, JobError> {
        let urls = self.filter(input);
        if urls.is_empty() {
            return Err(JobError::Validation("empty url set".to_string()));
        }
        Ok(urls)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerLimits {
    pub min: u32,
    pub max: u32,
}

impl Default for WorkerLimits {
    fn default() -> Self {
        Self { min: 1, max: 10 }
    }
}

impl WorkerLimits {
    pub fn validate(&self, workers: u32) -> Result<u32, JobError> {
        if workers < self.min || workers > self.max {
            return Err(JobError::Validation(format!(
                "worker count {} outside {}..={}",
                workers, self.min, self.max
            )));
        }
        Ok(workers)
    }
}
