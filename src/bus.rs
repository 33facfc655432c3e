//! Application-wide event bus.
//!
//! A closed set of event variants published over a tokio broadcast channel.
//! Consumers subscribe and match on the variants they care about; emitting
//! with no subscribers is a no-op.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::workspace::events::MachineStatusEvent;
use crate::workspace::model::Workspace;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum AppEvent {
    WorkspaceStarting {
        workspace: Workspace,
    },
    WorkspaceStarted {
        workspace: Workspace,
    },
    WorkspaceStopped {
        workspace: Workspace,
    },
    EnvironmentStatusChanged {
        event: MachineStatusEvent,
    },
    EnvironmentOutput {
        machine_name: String,
        content: String,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    /// Returns silently even if no subscribers are registered.
    pub fn emit(&self, event: AppEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::model::{WorkspaceConfig, WorkspaceStatus};

    fn workspace() -> Workspace {
        Workspace {
            id: "ws-1".into(),
            config: WorkspaceConfig {
                name: "dev".into(),
                default_env: None,
            },
            status: WorkspaceStatus::Starting,
            links: vec![],
        }
    }

    #[tokio::test]
    async fn test_emit_delivers_to_all_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(AppEvent::WorkspaceStarting {
            workspace: workspace(),
        });

        let got1 = rx1.recv().await.unwrap();
        let got2 = rx2.recv().await.unwrap();
        assert_eq!(got1, got2);
        assert!(matches!(got1, AppEvent::WorkspaceStarting { .. }));
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.emit(AppEvent::EnvironmentOutput {
            machine_name: "default".into(),
            content: "boot ok".into(),
        });
    }

    #[test]
    fn test_app_event_serialization_shape() {
        let event = AppEvent::EnvironmentOutput {
            machine_name: "default".into(),
            content: "line".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"EnvironmentOutput\""));
        assert!(json.contains("\"data\""));
    }
}
