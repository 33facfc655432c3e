//! Workspace lifecycle tracking: data model, wire events, and the event
//! router with its collaborators.

pub mod client;
pub mod events;
pub mod messages;
pub mod model;
pub mod notify;
pub mod progress;
pub mod router;

use std::sync::{Arc, RwLock};

use model::Workspace;

/// Shared slot holding the workspace the IDE is currently attached to.
#[derive(Clone, Default)]
pub struct CurrentWorkspace {
    inner: Arc<RwLock<Option<Workspace>>>,
}

impl CurrentWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, workspace: Workspace) {
        *self.inner.write().expect("current workspace poisoned") = Some(workspace);
    }

    pub fn get(&self) -> Option<Workspace> {
        self.inner
            .read()
            .expect("current workspace poisoned")
            .clone()
    }

    pub fn clear(&self) {
        *self.inner.write().expect("current workspace poisoned") = None;
    }
}

#[cfg(test)]
mod tests {
    use super::model::{WorkspaceConfig, WorkspaceStatus};
    use super::*;

    #[test]
    fn current_workspace_starts_empty() {
        assert!(CurrentWorkspace::new().get().is_none());
    }

    #[test]
    fn current_workspace_set_and_clear() {
        let current = CurrentWorkspace::new();
        current.set(Workspace {
            id: "ws-1".into(),
            config: WorkspaceConfig {
                name: "dev".into(),
                default_env: None,
            },
            status: WorkspaceStatus::Running,
            links: vec![],
        });
        assert_eq!(current.get().unwrap().id, "ws-1");
        current.clear();
        assert!(current.get().is_none());
    }
}
