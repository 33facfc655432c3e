//! Boot progress tracking and the blocking snapshot indicator.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use super::messages;

/// Stages rendered on the initial loading screen while a workspace comes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootStage {
    Booting,
    MachineStarting,
    AgentStarting,
}

impl BootStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Booting => "Workspace is booting",
            Self::MachineStarting => "Machine is starting",
            Self::AgentStarting => "Workspace agent is starting",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageStatus {
    #[default]
    Pending,
    InProgress,
    Success,
    Error,
}

/// Tracks per-stage status of the initial workspace loading flow.
#[derive(Default)]
pub struct BootProgress {
    stages: RwLock<HashMap<BootStage, StageStatus>>,
}

impl BootProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stage(&self, stage: BootStage, status: StageStatus) {
        self.stages
            .write()
            .expect("boot progress poisoned")
            .insert(stage, status);
    }

    pub fn status_of(&self, stage: BootStage) -> StageStatus {
        self.stages
            .read()
            .expect("boot progress poisoned")
            .get(&stage)
            .copied()
            .unwrap_or_default()
    }
}

/// A blocking progress indicator shown while a snapshot is being created.
pub trait SnapshotIndicator: Send + Sync {
    fn show(&self);
    fn hide(&self);
}

/// Terminal spinner implementation of [`SnapshotIndicator`].
pub struct SnapshotSpinner {
    bar: Mutex<Option<ProgressBar>>,
}

impl SnapshotSpinner {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }
}

impl Default for SnapshotSpinner {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotIndicator for SnapshotSpinner {
    fn show(&self) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .expect("progress bar template is a valid static string"),
        );
        spinner.set_message(messages::SNAPSHOT_IN_PROGRESS);
        spinner.enable_steady_tick(Duration::from_millis(100));
        *self.bar.lock().expect("snapshot spinner poisoned") = Some(spinner);
    }

    fn hide(&self) {
        if let Some(spinner) = self.bar.lock().expect("snapshot spinner poisoned").take() {
            spinner.finish_and_clear();
        }
    }
}
