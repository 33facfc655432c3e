//! Wire events delivered on workspace channels.
//!
//! Each channel carries exactly one message type. Status events drive the
//! router's dispatch table; machine status and log messages are re-wrapped
//! into application events without branching.

use serde::{Deserialize, Serialize};

/// Lifecycle event published on a workspace's status channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum WorkspaceStatusEvent {
    Starting,
    Running,
    Error { message: String },
    Stopped,
    SnapshotCreating,
    SnapshotCreated,
    SnapshotCreationError { message: String },
}

/// Status change of a single machine inside a workspace environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MachineStatusEvent {
    pub machine_name: String,
    pub status: MachineStatus,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Creating,
    Running,
    Destroying,
    Error,
}

/// One log line produced by a machine in a workspace environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MachineLogMessage {
    pub machine_name: String,
    pub content: String,
}
