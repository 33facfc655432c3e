//! Status notifications ("toasts") surfaced to the user.

use console::style;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Progress,
    Success,
    Fail,
}

/// How a notification is presented.
///
/// `Emerge` forces the notification area open, `Float` shows a transient
/// toast, `NotEmerge` records the notification without raising the area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Emerge,
    Float,
    NotEmerge,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, status: Status, mode: DisplayMode);
}

/// Notifier rendering to the terminal.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, message: &str, status: Status, mode: DisplayMode) {
        let marker = match status {
            Status::Progress => style("…").dim(),
            Status::Success => style("✔").green(),
            Status::Fail => style("✘").red(),
        };
        match mode {
            DisplayMode::NotEmerge => tracing::info!(%message, "notification"),
            _ => eprintln!("{} {}", marker, message),
        }
    }
}
