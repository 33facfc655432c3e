//! Routes a tracked workspace's channel events to their consumers.
//!
//! `track` subscribes to up to four channels per workspace: the lifecycle
//! status channel, the environment status and output channels advertised by
//! the workspace descriptor's links, and the agent log channel derived from
//! the workspace id. Status events drive a fixed dispatch table; the other
//! channels re-wrap every message into an [`AppEvent`] without branching.
//!
//! Transport failures never propagate to the caller of `track`: a channel
//! that cannot be subscribed is logged and skipped, and a dropped
//! subscription stays dropped until `track` is called again.

use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use tracing::error;

use crate::bus::{AppEvent, EventBus};
use crate::transport::{MessageBus, Subscriber, SubscriptionId};

use super::CurrentWorkspace;
use super::client::WorkspaceClient;
use super::events::{MachineLogMessage, MachineStatusEvent, WorkspaceStatusEvent};
use super::messages;
use super::model::{
    LINK_REL_ENVIRONMENT_OUTPUT_CHANNEL, LINK_REL_ENVIRONMENT_STATUS_CHANNEL,
    LINK_REL_WORKSPACE_EVENTS_CHANNEL, Workspace,
};
use super::notify::{DisplayMode, Notifier, Status};
use super::progress::{BootProgress, BootStage, SnapshotIndicator, StageStatus};

const SKIP_COUNT: usize = 0;
const MAX_COUNT: usize = 10;
/// Pseudo machine name attached to agent log lines.
const AGENT_MACHINE_NAME: &str = "default";

/// The agent log channel for a workspace.
pub fn agent_log_channel(workspace_id: &str) -> String {
    format!("workspace:{}:ext-server:output", workspace_id)
}

/// Callback signalling that the workspace component finished starting (or
/// failed); handed back to the start-workspace flow when the user picks a
/// replacement workspace after a start error.
pub type ReadyCallback = Arc<dyn Fn(anyhow::Result<()>) + Send + Sync>;

/// Modal dialogs shown to the user.
pub trait Dialogs: Send + Sync {
    fn message(&self, title: &str, content: &str, on_confirm: Box<dyn FnOnce() + Send>);
}

/// The picker flow for starting one of the user's workspaces.
pub trait StartWorkspaceFlow: Send + Sync {
    fn show(&self, workspaces: Vec<Workspace>, on_ready: ReadyCallback);
}

/// Consumer of machine lifecycle events for the tracked workspace.
pub trait MachineSupervisor: Send + Sync {
    /// Eagerly wake the supervisor so it does not miss early machine events.
    fn activate(&self);
}

/// The component that initiated snapshot creation and awaits its outcome.
pub trait SnapshotCreator: Send + Sync {
    fn succeeded(&self);
    fn failed(&self, message: &str);
}

/// Collaborators the router dispatches into, supplied by the caller.
pub struct RouterDeps {
    pub events: EventBus,
    pub notifier: Arc<dyn Notifier>,
    pub boot: Arc<BootProgress>,
    pub dialogs: Arc<dyn Dialogs>,
    pub snapshot_indicator: Arc<dyn SnapshotIndicator>,
    pub snapshots: Arc<dyn SnapshotCreator>,
    pub workspaces: Arc<dyn WorkspaceClient>,
    pub start_flow: Arc<dyn StartWorkspaceFlow>,
    pub machines: Arc<dyn MachineSupervisor>,
    pub current: CurrentWorkspace,
}

struct ChannelHandle {
    channel: String,
    id: SubscriptionId,
}

#[derive(Default)]
struct TrackState {
    status: Option<ChannelHandle>,
    env_status: Option<ChannelHandle>,
    env_output: Option<ChannelHandle>,
    agent_log: Option<ChannelHandle>,
}

/// Owns the subscription lifecycle for one tracked workspace.
///
/// Not designed for concurrent `track` calls: state is overwritten on each
/// call, so callers track one workspace per router instance at a time.
pub struct WorkspaceEventRouter {
    bus: Arc<dyn MessageBus>,
    deps: Arc<RouterDeps>,
    state: Arc<Mutex<TrackState>>,
}

impl WorkspaceEventRouter {
    pub fn new(bus: Arc<dyn MessageBus>, deps: RouterDeps) -> Self {
        Self {
            bus,
            deps: Arc::new(deps),
            state: Arc::new(Mutex::new(TrackState::default())),
        }
    }

    /// Start tracking a workspace's event channels.
    ///
    /// `on_ready` is held for the start-workspace flow reopened after a
    /// start error. Subscription failures are logged and swallowed.
    pub fn track(&self, workspace: Workspace, on_ready: ReadyCallback) {
        *self.state.lock().expect("router state poisoned") = TrackState::default();

        self.subscribe_status(&workspace, on_ready);
        self.subscribe_environment_status(&workspace);
        self.subscribe_environment_output(&workspace);
        self.subscribe_agent_log(&workspace);
    }

    fn subscribe_status(&self, workspace: &Workspace, on_ready: ReadyCallback) {
        if workspace.link(LINK_REL_WORKSPACE_EVENTS_CHANNEL).is_none() {
            self.deps
                .notifier
                .notify(messages::SUBSCRIBE_FAILED, Status::Fail, DisplayMode::Emerge);
            error!(
                rel = LINK_REL_WORKSPACE_EVENTS_CHANNEL,
                workspace = %workspace.id,
                "workspace descriptor has no status events link, lifecycle events will not be handled"
            );
            return;
        }
        let Some(channel) = workspace.channel_for(LINK_REL_WORKSPACE_EVENTS_CHANNEL) else {
            self.deps
                .notifier
                .notify(messages::SUBSCRIBE_FAILED, Status::Fail, DisplayMode::Emerge);
            error!(
                workspace = %workspace.id,
                "no channel advertised for workspace status events, lifecycle events will not be handled"
            );
            return;
        };

        let dispatcher = Arc::new(StatusDispatcher {
            bus: self.bus.clone(),
            deps: self.deps.clone(),
            state: self.state.clone(),
            workspace: workspace.clone(),
            on_ready,
        });

        let notifier = self.deps.notifier.clone();
        let subscriber = Subscriber::json::<WorkspaceStatusEvent, _>(&channel, move |event| {
            let dispatcher = dispatcher.clone();
            async move { dispatcher.handle(event).await }.boxed()
        })
        .on_error(move |err| {
            notifier.notify(&err.to_string(), Status::Fail, DisplayMode::NotEmerge)
        });

        let handle = self.subscribe(&channel, subscriber);
        self.state.lock().expect("router state poisoned").status = handle;
    }

    fn subscribe_environment_status(&self, workspace: &Workspace) {
        let Some(channel) = workspace.channel_for(LINK_REL_ENVIRONMENT_STATUS_CHANNEL) else {
            return;
        };
        let events = self.deps.events.clone();
        let subscriber = Subscriber::json::<MachineStatusEvent, _>(&channel, move |event| {
            events.emit(AppEvent::EnvironmentStatusChanged { event });
            futures_util::future::ready(()).boxed()
        });
        let handle = self.subscribe(&channel, subscriber);
        self.state.lock().expect("router state poisoned").env_status = handle;
    }

    fn subscribe_environment_output(&self, workspace: &Workspace) {
        let Some(channel) = workspace.channel_for(LINK_REL_ENVIRONMENT_OUTPUT_CHANNEL) else {
            return;
        };
        let events = self.deps.events.clone();
        let subscriber = Subscriber::json::<MachineLogMessage, _>(&channel, move |log| {
            events.emit(AppEvent::EnvironmentOutput {
                machine_name: log.machine_name,
                content: log.content,
            });
            futures_util::future::ready(()).boxed()
        });
        let handle = self.subscribe(&channel, subscriber);
        self.state.lock().expect("router state poisoned").env_output = handle;
    }

    fn subscribe_agent_log(&self, workspace: &Workspace) {
        let channel = agent_log_channel(&workspace.id);
        let events = self.deps.events.clone();
        let subscriber = Subscriber::text(move |line| {
            events.emit(AppEvent::EnvironmentOutput {
                machine_name: AGENT_MACHINE_NAME.to_string(),
                content: line,
            });
            futures_util::future::ready(()).boxed()
        });
        let handle = self.subscribe(&channel, subscriber);
        self.state.lock().expect("router state poisoned").agent_log = handle;
    }

    fn subscribe(&self, channel: &str, subscriber: Subscriber) -> Option<ChannelHandle> {
        match self.bus.subscribe(channel, subscriber) {
            Ok(id) => Some(ChannelHandle {
                channel: channel.to_string(),
                id,
            }),
            Err(err) => {
                error!(channel = %channel, error = %err, "failed to subscribe to channel");
                None
            }
        }
    }
}

/// Dispatches status channel events to the router's collaborators.
struct StatusDispatcher {
    bus: Arc<dyn MessageBus>,
    deps: Arc<RouterDeps>,
    state: Arc<Mutex<TrackState>>,
    workspace: Workspace,
    on_ready: ReadyCallback,
}

impl StatusDispatcher {
    async fn handle(self: Arc<Self>, event: WorkspaceStatusEvent) {
        let deps = &self.deps;
        match event {
            WorkspaceStatusEvent::Starting => {
                deps.current.set(self.workspace.clone());
                deps.machines.activate();
                deps.boot
                    .set_stage(BootStage::Booting, StageStatus::InProgress);
                deps.events.emit(AppEvent::WorkspaceStarting {
                    workspace: self.workspace.clone(),
                });
            }

            WorkspaceStatusEvent::Running => {
                deps.current.set(self.workspace.clone());
                deps.notifier.notify(
                    messages::WORKSPACE_STARTED,
                    Status::Success,
                    DisplayMode::Float,
                );
                deps.boot.set_stage(BootStage::Booting, StageStatus::Success);
                deps.events.emit(AppEvent::WorkspaceStarted {
                    workspace: self.workspace.clone(),
                });
            }

            WorkspaceStatusEvent::Error { message } => {
                self.unsubscribe_all();
                deps.notifier.notify(
                    messages::WORKSPACE_START_FAILED,
                    Status::Fail,
                    DisplayMode::Float,
                );
                deps.boot.set_stage(BootStage::Booting, StageStatus::Error);
                self.offer_restart(&message).await;
                deps.events.emit(AppEvent::WorkspaceStopped {
                    workspace: self.workspace.clone(),
                });
            }

            WorkspaceStatusEvent::Stopped => {
                self.unsubscribe_all();
                deps.notifier.notify(
                    messages::WORKSPACE_STOPPED,
                    Status::Success,
                    DisplayMode::Float,
                );
                deps.events.emit(AppEvent::WorkspaceStopped {
                    workspace: self.workspace.clone(),
                });
            }

            WorkspaceStatusEvent::SnapshotCreating => {
                deps.snapshot_indicator.show();
            }

            WorkspaceStatusEvent::SnapshotCreated => {
                deps.snapshot_indicator.hide();
                deps.snapshots.succeeded();
            }

            WorkspaceStatusEvent::SnapshotCreationError { message } => {
                deps.snapshot_indicator.hide();
                deps.snapshots.failed(&message);
            }
        }
    }

    /// Fetch the user's workspaces and offer reopening the start flow.
    async fn offer_restart(&self, cause: &str) {
        let workspace_name = self.workspace.config.name.clone();
        match self.deps.workspaces.list(SKIP_COUNT, MAX_COUNT).await {
            Ok(workspaces) => {
                let flow = self.deps.start_flow.clone();
                let on_ready = self.on_ready.clone();
                self.deps.dialogs.message(
                    messages::START_ERROR_TITLE,
                    &messages::start_error_content(&workspace_name, cause),
                    Box::new(move || flow.show(workspaces, on_ready)),
                );
            }
            Err(err) => {
                error!(error = %err, "failed to fetch workspace list after start error");
            }
        }
    }

    /// Drop every live subscription for this workspace.
    ///
    /// Handles that were never established are skipped; transport failures
    /// are logged and swallowed. Each handle is released at most once.
    fn unsubscribe_all(&self) {
        let handles = {
            let mut state = self.state.lock().expect("router state poisoned");
            [
                state.status.take(),
                state.env_status.take(),
                state.env_output.take(),
                state.agent_log.take(),
            ]
        };
        for handle in handles.into_iter().flatten() {
            if let Err(err) = self.bus.unsubscribe(&handle.channel, handle.id) {
                error!(channel = %handle.channel, error = %err, "failed to unsubscribe from channel");
            }
        }
    }
}
