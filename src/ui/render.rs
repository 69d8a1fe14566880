// ABOUTME: Renders StateChange notifications to the terminal
// ABOUTME: Drives an indicatif progress bar and prints badges and result summaries

use indicatif::{ProgressBar, ProgressStyle};

use super::log::{ActivityLog, LogKind};
use crate::job::{ControllerState, JobResults, JobStatus, StateChange};

const IDLE_TASK: &str = "Not started";

pub fn badge(state: ControllerState) -> &'static str {
    match state {
        ControllerState::Idle => "[ READY ]",
        ControllerState::Running => "[ RUNNING ]",
        ControllerState::Completed => "[ COMPLETED ]",
        ControllerState::Errored => "[ ERROR ]",
        ControllerState::Stopped => "[ STOPPED ]",
    }
}

/// Badge state for a one-off status snapshot. A finished service that never
/// produced results (`results` absent or `{}`) has not run, so it is idle.
pub fn remote_state(status: &JobStatus) -> ControllerState {
    let never_ran = status
        .results
        .as_ref()
        .map_or(true, |r| *r == JobResults::default());
    if !status.is_running && status.error.is_none() && never_ran {
        return ControllerState::Idle;
    }
    ControllerState::after_poll(status)
}

pub fn summary_lines(results: &JobResults) -> Vec<String> {
    let mut lines = vec![
        format!("Series:   {}", results.series_count),
        format!("Products: {}", results.products_count),
        format!("Success:  {}", results.success_count),
        format!("Errors:   {}", results.error_count),
    ];
    if let Some(duration) = results.duration_secs {
        lines.push(format!("Duration: {}s", duration.round() as u64));
    }
    lines
}

pub struct TerminalRenderer {
    bar: ProgressBar,
    log: ActivityLog,
    last_state: Option<ControllerState>,
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalRenderer {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self::with_bar(bar)
    }

    /// Plain line output without a progress bar, for non-terminal stdout.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            log: ActivityLog::default(),
            last_state: None,
        }
    }

    pub fn log(&mut self, kind: LogKind, message: impl Into<String>) {
        let line = self.log.push(kind, message).to_string();
        self.line(line);
    }

    fn line(&self, line: impl AsRef<str>) {
        if self.bar.is_hidden() {
            println!("{}", line.as_ref());
        } else {
            self.bar.println(line);
        }
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.log
    }

    pub fn render(&mut self, change: &StateChange) {
        if let Some(status) = &change.status {
            self.update_progress(status);
        }

        let entered = self.last_state != Some(change.state);
        self.last_state = Some(change.state);

        if let Some(message) = &change.message {
            let kind = match change.state {
                ControllerState::Errored => LogKind::Error,
                ControllerState::Stopped => LogKind::Warning,
                ControllerState::Completed | ControllerState::Running => LogKind::Success,
                ControllerState::Idle => LogKind::Info,
            };
            self.log(kind, message.clone());
        }

        if !entered {
            return;
        }
        self.line(badge(change.state));

        match change.state {
            ControllerState::Running => self.bar.reset(),
            ControllerState::Completed => {
                let results = change.status.as_ref().and_then(|s| s.results.as_ref());
                if let Some(results) = results {
                    for line in summary_lines(results) {
                        self.line(line);
                    }
                }
                self.bar.finish();
            }
            ControllerState::Errored | ControllerState::Stopped => self.bar.abandon(),
            ControllerState::Idle => {}
        }
    }

    fn update_progress(&self, status: &JobStatus) {
        self.bar.set_position(status.progress_percent.round() as u64);
        self.bar
            .set_message(status.current_task.clone().unwrap_or_else(|| IDLE_TASK.to_string()));
    }
}
