// ABOUTME: Configuration for the controller CLI, loaded from TOML
// ABOUTME: Missing files fall back to defaults; CLI flags override individual keys

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::job::urls::DEFAULT_REQUIRED_DOMAIN;
use crate::job::{ControllerOptions, PollOptions, UrlFilter, WorkerLimits};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the scraping service, without the `/api` suffix.
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Unset means failed polls are retried indefinitely.
    pub max_consecutive_failures: Option<u32>,
    pub required_domain: String,
    pub default_workers: u32,
    pub max_workers: u32,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            request_timeout_secs: 30,
            poll_interval_ms: 1000,
            max_consecutive_failures: None,
            required_domain: DEFAULT_REQUIRED_DOMAIN.to_string(),
            default_workers: 5,
            max_workers: 10,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Reads `path`, or returns the defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            anyhow::bail!("base_url must not be empty");
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }
        if self.default_workers == 0 || self.default_workers > self.max_workers {
            anyhow::bail!(
                "default_workers ({}) must be within 1..={}",
                self.default_workers,
                self.max_workers
            );
        }
        if self.max_consecutive_failures == Some(0) {
            anyhow::bail!("max_consecutive_failures must be at least 1 when set");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            url_filter: UrlFilter::new(self.required_domain.clone()),
            worker_limits: WorkerLimits {
                min: 1,
                max: self.max_workers,
            },
            poll: PollOptions {
                interval: Duration::from_millis(self.poll_interval_ms),
                max_consecutive_failures: self.max_consecutive_failures,
            },
            ..ControllerOptions::default()
        }
    }
}
