// ABOUTME: Scripted in-memory scraping service shared by the integration tests
// ABOUTME: Records every call and can hold requests open to simulate in-flight responses

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use scrape_controller::job::{
    ControllerOptions, JobCommandResult, JobResults, JobStatus, PollOptions,
};
use scrape_controller::remote::SampleUrl;
use scrape_controller::{JobController, JobError, JobService};

pub const URL_A: &str = "https://www.fotek.com.tw/en-gb/product-category/72";
pub const URL_B: &str = "https://www.fotek.com.tw/en-gb/product-category/74";
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Holds a call open until the test releases it.
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

pub struct FakeService {
    start_reply: Mutex<Result<JobCommandResult, JobError>>,
    stop_reply: Mutex<Result<JobCommandResult, JobError>>,
    statuses: Mutex<VecDeque<Result<JobStatus, JobError>>>,
    start_gate: Option<Arc<Gate>>,
    status_gate: Option<Arc<Gate>>,
    pub started_with: Mutex<Vec<(Vec<String>, u32)>>,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl FakeService {
    pub fn new() -> Self {
        Self {
            start_reply: Mutex::new(Ok(JobCommandResult::accepted(None, None))),
            stop_reply: Mutex::new(Ok(JobCommandResult::accepted(
                None,
                Some("Stopped".to_string()),
            ))),
            statuses: Mutex::new(VecDeque::new()),
            start_gate: None,
            status_gate: None,
            started_with: Mutex::new(Vec::new()),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    /// Replies to successive polls in order; once exhausted every poll
    /// reports a job still running at 0%.
    pub fn with_statuses(self, statuses: Vec<Result<JobStatus, JobError>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn with_start_reply(self, reply: Result<JobCommandResult, JobError>) -> Self {
        *self.start_reply.lock().unwrap() = reply;
        self
    }

    pub fn with_stop_reply(self, reply: Result<JobCommandResult, JobError>) -> Self {
        *self.stop_reply.lock().unwrap() = reply;
        self
    }

    pub fn with_start_gate(mut self, gate: Arc<Gate>) -> Self {
        self.start_gate = Some(gate);
        self
    }

    pub fn with_status_gate(mut self, gate: Arc<Gate>) -> Self {
        self.status_gate = Some(gate);
        self
    }

    pub fn starts(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobService for FakeService {
    async fn start(&self, urls: &[String], max_workers: u32) -> Result<JobCommandResult, JobError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.started_with
            .lock()
            .unwrap()
            .push((urls.to_vec(), max_workers));
        if let Some(gate) = &self.start_gate {
            gate.pass().await;
        }
        self.start_reply.lock().unwrap().clone()
    }

    async fn stop(&self) -> Result<JobCommandResult, JobError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.stop_reply.lock().unwrap().clone()
    }

    async fn status(&self) -> Result<JobStatus, JobError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(running(0.0)));
        if let Some(gate) = &self.status_gate {
            gate.pass().await;
        }
        next
    }

    async fn sample_urls(&self) -> Result<Vec<SampleUrl>, JobError> {
        Ok(vec![SampleUrl {
            name: "Proximity Sensors".to_string(),
            description: "Proximity sensors".to_string(),
            url: URL_A.to_string(),
        }])
    }

    async fn download_results(&self) -> Result<Vec<u8>, JobError> {
        Err(JobError::CommandRejected("no results".to_string()))
    }
}

pub fn running(progress: f64) -> JobStatus {
    JobStatus {
        is_running: true,
        progress_percent: progress,
        current_task: Some("Extracting products".to_string()),
        error: None,
        results: None,
    }
}

pub fn finished(success_count: u64) -> JobStatus {
    JobStatus {
        is_running: false,
        progress_percent: 100.0,
        current_task: Some("Done".to_string()),
        error: None,
        results: Some(JobResults {
            series_count: 2,
            products_count: success_count,
            success_count,
            error_count: 0,
            duration_secs: Some(4.2),
        }),
    }
}

pub fn failed(error: &str) -> JobStatus {
    JobStatus {
        is_running: false,
        progress_percent: 10.0,
        current_task: Some(format!("Error: {}", error)),
        error: Some(error.to_string()),
        results: None,
    }
}

pub fn transport_error() -> JobError {
    JobError::Transport("connection reset".to_string())
}

pub fn options() -> ControllerOptions {
    ControllerOptions {
        poll: PollOptions {
            interval: POLL_INTERVAL,
            max_consecutive_failures: None,
        },
        ..ControllerOptions::default()
    }
}

pub fn controller(service: &Arc<FakeService>) -> JobController {
    JobController::new(service.clone(), options())
}

/// Polls `cond` until it holds, panicking after two seconds.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {}", what);
}
