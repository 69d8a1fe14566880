// ABOUTME: Terminal presentation of controller notifications
// ABOUTME: Progress bar, status badge, summary counters, and a bounded activity log

pub mod log;
pub mod render;

pub use log::{ActivityLog, LogKind};
pub use render::TerminalRenderer;
