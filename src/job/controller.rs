// ABOUTME: Job controller: issues start/stop commands and owns the lifecycle state
// ABOUTME: Applies polled statuses, guards against stale responses, and broadcasts changes

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::synchronizer::{PollOptions, StatusSynchronizer};
use super::types::{ControllerState, JobCommandResult, JobStatus, StateChange};
use super::urls::{UrlFilter, WorkerLimits};
use crate::error::JobError;
use crate::remote::JobService;

const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub url_filter: UrlFilter,
    pub worker_limits: WorkerLimits,
    pub poll: PollOptions,
    /// Buffered notifications per subscriber before the slowest one lags.
    pub event_capacity: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            url_filter: UrlFilter::default(),
            worker_limits: WorkerLimits::default(),
            poll: PollOptions::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Drives one remote job at a time.
///
/// Cloning is cheap and every clone shares the same state, poller, and
/// notification channel. The state lock is never held across an await.
#[derive(Clone)]
pub struct JobController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    service: Arc<dyn JobService>,
    url_filter: UrlFilter,
    worker_limits: WorkerLimits,
    core: Mutex<Core>,
    synchronizer: StatusSynchronizer,
    events: broadcast::Sender<StateChange>,
}

struct Core {
    state: ControllerState,
    // Bumped on every run entered; poll results from older runs are stale.
    epoch: u64,
    last_status: Option<JobStatus>,
    command_in_flight: bool,
}

/// Clears the in-flight flag when the command resolves or its future is dropped.
struct CommandGuard<'a> {
    inner: &'a ControllerInner,
}

impl Drop for CommandGuard<'_> {
    fn drop(&mut self) {
        self.inner.core().command_in_flight = false;
    }
}

impl ControllerInner {
    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl JobController {
    pub fn new(service: Arc<dyn JobService>, options: ControllerOptions) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));

        Self {
            inner: Arc::new(ControllerInner {
                service,
                url_filter: options.url_filter,
                worker_limits: options.worker_limits,
                core: Mutex::new(Core {
                    state: ControllerState::Idle,
                    epoch: 0,
                    last_status: None,
                    command_in_flight: false,
                }),
                synchronizer: StatusSynchronizer::new(options.poll),
                events,
            }),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.inner.core().state
    }

    pub fn last_status(&self) -> Option<JobStatus> {
        self.inner.core().last_status.clone()
    }

    pub fn service(&self) -> &Arc<dyn JobService> {
        &self.inner.service
    }

    pub fn synchronizer(&self) -> &StatusSynchronizer {
        &self.inner.synchronizer
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.inner.events.subscribe()
    }

    /// Validates `input`, asks the service to start, and enters `Running`
    /// with a live poller once the request is accepted.
    pub async fn request_start(
        &self,
        input: &str,
        workers: u32,
    ) -> Result<JobCommandResult, JobError> {
        let urls = self.inner.url_filter.validate(input)?;
        let workers = self.inner.worker_limits.validate(workers)?;
        let _guard = self.begin_command("start", |state| !state.is_running())?;

        info!(urls = urls.len(), workers, "Requesting job start");
        let result = self.inner.service.start(&urls, workers).await.map_err(|e| {
            warn!(error = %e, "Start request failed");
            e
        })?;

        if !result.accepted {
            let message = result
                .message
                .clone()
                .unwrap_or_else(|| "start request rejected".to_string());
            warn!(%message, "Start request rejected");
            return Err(JobError::CommandRejected(message));
        }

        let epoch = {
            let mut core = self.inner.core();
            core.epoch += 1;
            core.state = ControllerState::Running;
            core.last_status = None;
            core.epoch
        };

        let count = result.accepted_count.unwrap_or(urls.len() as u32);
        info!(epoch, count, "Job started");
        self.emit(
            ControllerState::Running,
            None,
            Some(format!("Started scraping {} categories", count)),
        );
        self.inner.synchronizer.start(self.clone());

        Ok(result)
    }

    /// Asks the service to stop the running job.
    ///
    /// If a poll already moved the run to a terminal state while the request
    /// was in flight, that terminal state is kept.
    pub async fn request_stop(&self) -> Result<JobCommandResult, JobError> {
        let _guard = self.begin_command("stop", ControllerState::is_running)?;

        info!("Requesting job stop");
        let result = self.inner.service.stop().await.map_err(|e| {
            warn!(error = %e, "Stop request failed");
            e
        })?;

        if !result.accepted {
            let message = result
                .message
                .clone()
                .unwrap_or_else(|| "stop request rejected".to_string());
            warn!(%message, "Stop request rejected");
            return Err(JobError::CommandRejected(message));
        }

        let stopped = {
            let mut core = self.inner.core();
            if core.state.is_running() {
                core.state = ControllerState::Stopped;
                true
            } else {
                false
            }
        };
        self.inner.synchronizer.stop();

        if stopped {
            info!("Job stopped");
            self.emit(
                ControllerState::Stopped,
                self.last_status(),
                Some("Scraping stopped".to_string()),
            );
        }

        Ok(result)
    }

    /// Reconciles with a job that may already be running remotely, e.g. after
    /// this controller was restarted or lost its connection.
    pub async fn attach(&self) -> Result<ControllerState, JobError> {
        let _guard = self.begin_command("attach", |state| !state.is_running())?;

        let status = self.inner.service.status().await?;
        let state = {
            let mut core = self.inner.core();
            if status.is_running {
                core.epoch += 1;
                core.state = ControllerState::Running;
            }
            core.last_status = Some(status.clone());
            core.state
        };

        info!(%state, remote_running = status.is_running, "Attached to scraping service");
        self.emit(state, Some(status), None);
        if state.is_running() {
            self.inner.synchronizer.start(self.clone());
        }

        Ok(state)
    }

    /// Applies a status polled under `epoch`.
    ///
    /// Returns the resulting state, or `None` if the response is stale: the
    /// controller left `Running` or entered a newer run after the poll was issued.
    pub fn apply_status(&self, epoch: u64, status: JobStatus) -> Option<ControllerState> {
        self.apply_polled(epoch, status, None)
    }

    /// Like [`apply_status`](Self::apply_status), but cancels `poller` under
    /// the state lock when the run leaves `Running`. A start that observes the
    /// new state then also observes the exiting poller as inactive.
    pub(crate) fn apply_polled(
        &self,
        epoch: u64,
        status: JobStatus,
        poller: Option<&CancellationToken>,
    ) -> Option<ControllerState> {
        let next = {
            let mut core = self.inner.core();
            if core.epoch != epoch || !core.state.is_running() {
                debug!(
                    epoch,
                    current_epoch = core.epoch,
                    state = %core.state,
                    "Discarding stale status"
                );
                return None;
            }
            let next = ControllerState::after_poll(&status);
            core.state = next;
            core.last_status = Some(status.clone());
            if !next.is_running() {
                if let Some(poller) = poller {
                    poller.cancel();
                }
            }
            next
        };

        let message = match next {
            ControllerState::Completed => {
                info!(successes = status.success_count(), "Job completed");
                Some("Scraping completed".to_string())
            }
            ControllerState::Errored => {
                let error = status.error.clone().unwrap_or_default();
                warn!(%error, "Job failed");
                Some(error)
            }
            ControllerState::Stopped => {
                info!("Job finished without results");
                None
            }
            _ => None,
        };
        self.emit(next, Some(status), message);

        Some(next)
    }

    /// Epoch of the current run, if one is believed active.
    pub(crate) fn running_epoch(&self) -> Option<u64> {
        let core = self.inner.core();
        core.state.is_running().then_some(core.epoch)
    }

    /// Gives up on a run whose status could not be fetched repeatedly.
    pub(crate) fn fail_polling(&self, epoch: u64, error: &JobError, poller: &CancellationToken) {
        {
            let mut core = self.inner.core();
            if core.epoch != epoch || !core.state.is_running() {
                return;
            }
            core.state = ControllerState::Errored;
            poller.cancel();
        }
        warn!(error = %error, "Lost track of the running job");
        self.emit(
            ControllerState::Errored,
            self.last_status(),
            Some(error.to_string()),
        );
    }

    fn begin_command(
        &self,
        command: &'static str,
        allowed: impl Fn(&ControllerState) -> bool,
    ) -> Result<CommandGuard<'_>, JobError> {
        let mut core = self.inner.core();
        if core.command_in_flight {
            return Err(JobError::CommandInFlight);
        }
        if !allowed(&core.state) {
            return Err(JobError::InvalidState {
                command,
                state: core.state,
            });
        }
        core.command_in_flight = true;
        Ok(CommandGuard { inner: &self.inner })
    }

    fn emit(&self, state: ControllerState, status: Option<JobStatus>, message: Option<String>) {
        // No subscribers is fine.
        let _ = self.inner.events.send(StateChange {
            state,
            status,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::types::JobResults;
    use crate::remote::SampleUrl;
    use async_trait::async_trait;

    /// Accepts every command and never gets polled in these tests.
    struct AcceptAll;

    #[async_trait]
    impl JobService for AcceptAll {
        async fn start(&self, urls: &[String], _workers: u32) -> Result<JobCommandResult, JobError> {
            Ok(JobCommandResult::accepted(Some(urls.len() as u32), None))
        }
        async fn stop(&self) -> Result<JobCommandResult, JobError> {
            Ok(JobCommandResult::accepted(None, None))
        }
        async fn status(&self) -> Result<JobStatus, JobError> {
            Err(JobError::Transport("not scripted".into()))
        }
        async fn sample_urls(&self) -> Result<Vec<SampleUrl>, JobError> {
            Ok(Vec::new())
        }
        async fn download_results(&self) -> Result<Vec<u8>, JobError> {
            Ok(Vec::new())
        }
    }

    fn controller() -> JobController {
        JobController::new(Arc::new(AcceptAll), ControllerOptions::default())
    }

    const URL: &str = "https://www.fotek.com.tw/en-gb/product-category/72";

    #[tokio::test]
    async fn test_stale_epoch_is_discarded() {
        let controller = controller();
        controller.request_start(URL, 5).await.unwrap();
        let epoch = controller.running_epoch().unwrap();

        let finished = JobStatus {
            is_running: false,
            results: Some(JobResults {
                success_count: 2,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(controller.apply_status(epoch + 1, finished.clone()), None);
        assert_eq!(controller.state(), ControllerState::Running);

        assert_eq!(
            controller.apply_status(epoch, finished),
            Some(ControllerState::Completed)
        );
        assert_eq!(controller.apply_status(epoch, JobStatus::default()), None);
        controller.synchronizer().stop();
    }

    #[tokio::test]
    async fn test_progress_update_is_broadcast() {
        let controller = controller();
        let mut events = controller.subscribe();
        controller.request_start(URL, 5).await.unwrap();
        let epoch = controller.running_epoch().unwrap();

        let started = events.recv().await.unwrap();
        assert_eq!(started.state, ControllerState::Running);
        assert_eq!(started.message.as_deref(), Some("Started scraping 1 categories"));

        let progress = JobStatus {
            is_running: true,
            progress_percent: 10.0,
            current_task: Some("Extracting series".into()),
            ..Default::default()
        };
        controller.apply_status(epoch, progress.clone());
        let update = events.recv().await.unwrap();
        assert_eq!(update.state, ControllerState::Running);
        assert_eq!(update.status, Some(progress));
        controller.synchronizer().stop();
    }

    #[tokio::test]
    async fn test_fail_polling_errors_the_run() {
        let controller = controller();
        controller.request_start(URL, 5).await.unwrap();
        let epoch = controller.running_epoch().unwrap();

        let poller = CancellationToken::new();
        controller.fail_polling(epoch, &JobError::Transport("timed out".into()), &poller);
        assert!(poller.is_cancelled());
        assert_eq!(controller.state(), ControllerState::Errored);
        assert_eq!(controller.running_epoch(), None);
        controller.synchronizer().stop();
    }

    #[tokio::test]
    async fn test_stop_from_idle_is_invalid() {
        let controller = controller();
        let err = controller.request_stop().await.unwrap_err();
        assert_eq!(
            err,
            JobError::InvalidState {
                command: "stop",
                state: ControllerState::Idle
            }
        );
    }
}
