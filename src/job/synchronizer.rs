// ABOUTME: Recurring status poll that runs while the controller believes a job is active
// ABOUTME: At most one poll loop per controller; stops itself once a terminal state is seen

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::controller::JobController;
use crate::error::JobError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// Consecutive failed polls tolerated before the run is marked errored.
    /// `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_failures: None,
        }
    }
}

pub struct StatusSynchronizer {
    options: PollOptions,
    slot: Arc<Mutex<Option<ActivePoll>>>,
    next_id: AtomicU64,
}

struct ActivePoll {
    id: u64,
    cancel: CancellationToken,
}

fn lock(slot: &Mutex<Option<ActivePoll>>) -> MutexGuard<'_, Option<ActivePoll>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StatusSynchronizer {
    pub fn new(options: PollOptions) -> Self {
        Self {
            options,
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.slot)
            .as_ref()
            .map(|active| !active.cancel.is_cancelled())
            .unwrap_or(false)
    }

    /// Spawns the poll loop for `controller`. Returns `false` without doing
    /// anything if a loop is already active.
    pub fn start(&self, controller: JobController) -> bool {
        let mut slot = lock(&self.slot);
        if let Some(active) = slot.as_ref() {
            if !active.cancel.is_cancelled() {
                debug!(poller = active.id, "Status poller already active");
                return false;
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        debug!(
            poller = id,
            interval_ms = self.options.interval.as_millis() as u64,
            "Starting status poller"
        );

        tokio::spawn(poll_loop(
            controller,
            self.options.clone(),
            id,
            cancel.clone(),
            Arc::clone(&self.slot),
        ));
        *slot = Some(ActivePoll { id, cancel });
        true
    }

    /// Cancels the pending tick. A poll already in flight still resolves, but
    /// the controller discards it unless the run is still current.
    ///
    /// Returns `false` when nothing was active.
    pub fn stop(&self) -> bool {
        match lock(&self.slot).take() {
            Some(active) => {
                active.cancel.cancel();
                debug!(poller = active.id, "Stopped status poller");
                true
            }
            None => false,
        }
    }
}

/// Releases the slot only if it still belongs to poller `id`.
fn release(slot: &Mutex<Option<ActivePoll>>, id: u64) {
    let mut slot = lock(slot);
    if slot.as_ref().map(|active| active.id) == Some(id) {
        if let Some(active) = slot.take() {
            active.cancel.cancel();
        }
        debug!(poller = id, "Status poller finished");
    }
}

async fn poll_loop(
    controller: JobController,
    options: PollOptions,
    id: u64,
    cancel: CancellationToken,
    slot: Arc<Mutex<Option<ActivePoll>>>,
) {
    // interval_at panics on a zero period.
    let period = options.interval.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(epoch) = controller.running_epoch() else {
            break;
        };

        match controller.service().status().await {
            Ok(status) => {
                failures = 0;
                match controller.apply_polled(epoch, status, Some(&cancel)) {
                    Some(state) if state.is_running() => {}
                    _ => break,
                }
            }
            Err(err) => {
                failures += 1;
                warn!(poller = id, error = %err, failures, "Status poll failed");

                if let Some(max) = options.max_consecutive_failures {
                    if failures >= max {
                        let err = JobError::Transport(format!(
                            "status unavailable after {} consecutive attempts: {}",
                            failures, err
                        ));
                        controller.fail_polling(epoch, &err, &cancel);
                        break;
                    }
                }
            }
        }
    }

    release(&slot, id);
}
