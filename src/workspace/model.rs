use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Link relation carrying the workspace lifecycle event channel name.
pub const LINK_REL_WORKSPACE_EVENTS_CHANNEL: &str = "workspace.events.channel";
/// Link relation carrying the environment status channel name.
pub const LINK_REL_ENVIRONMENT_STATUS_CHANNEL: &str = "environment.status.channel";
/// Link relation carrying the environment output channel name.
pub const LINK_REL_ENVIRONMENT_OUTPUT_CHANNEL: &str = "environment.output.channel";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workspace {
    pub id: String,
    pub config: WorkspaceConfig,
    pub status: WorkspaceStatus,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Workspace {
    /// The first link with the given relation, if the descriptor carries one.
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == rel)
    }

    /// The channel name advertised by the given link relation.
    ///
    /// A missing link, a missing `channel` parameter, or an empty default
    /// value all mean the feature is unavailable, never an error.
    pub fn channel_for(&self, rel: &str) -> Option<String> {
        self.link(rel)
            .and_then(|l| l.parameter("channel"))
            .and_then(|p| p.default_value.clone())
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceConfig {
    pub name: String,
    #[serde(default)]
    pub default_env: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStatus {
    Starting,
    Running,
    Stopped,
}

impl WorkspaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl FromStr for WorkspaceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starting" => Ok(Self::Starting),
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            _ => Err(format!("Invalid workspace status: {}", s)),
        }
    }
}

/// A named relation on a resource descriptor, mirroring the REST link shape
/// the workspace master embeds in workspace payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(default)]
    pub parameters: Vec<LinkParameter>,
}

impl Link {
    pub fn parameter(&self, name: &str) -> Option<&LinkParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkParameter {
    pub name: String,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_with_channel(rel: &str, channel: Option<&str>) -> Workspace {
        Workspace {
            id: "ws-1".into(),
            config: WorkspaceConfig {
                name: "dev".into(),
                default_env: None,
            },
            status: WorkspaceStatus::Starting,
            links: vec![Link {
                rel: rel.into(),
                href: "wss://example/events".into(),
                parameters: vec![LinkParameter {
                    name: "channel".into(),
                    default_value: channel.map(str::to_string),
                }],
            }],
        }
    }

    #[test]
    fn channel_for_returns_advertised_channel() {
        let ws = workspace_with_channel(LINK_REL_WORKSPACE_EVENTS_CHANNEL, Some("workspace:ws-1"));
        assert_eq!(
            ws.channel_for(LINK_REL_WORKSPACE_EVENTS_CHANNEL),
            Some("workspace:ws-1".to_string())
        );
    }

    #[test]
    fn channel_for_missing_link_is_none() {
        let ws = workspace_with_channel(LINK_REL_ENVIRONMENT_STATUS_CHANNEL, Some("x"));
        assert_eq!(ws.channel_for(LINK_REL_WORKSPACE_EVENTS_CHANNEL), None);
    }

    #[test]
    fn channel_for_empty_default_value_is_none() {
        let ws = workspace_with_channel(LINK_REL_WORKSPACE_EVENTS_CHANNEL, Some(""));
        assert_eq!(ws.channel_for(LINK_REL_WORKSPACE_EVENTS_CHANNEL), None);
    }

    #[test]
    fn channel_for_missing_parameter_is_none() {
        let mut ws = workspace_with_channel(LINK_REL_WORKSPACE_EVENTS_CHANNEL, Some("x"));
        ws.links[0].parameters.clear();
        assert_eq!(ws.channel_for(LINK_REL_WORKSPACE_EVENTS_CHANNEL), None);
    }

    #[test]
    fn workspace_status_round_trips_as_str() {
        for status in [
            WorkspaceStatus::Starting,
            WorkspaceStatus::Running,
            WorkspaceStatus::Stopped,
        ] {
            assert_eq!(status.as_str().parse::<WorkspaceStatus>(), Ok(status));
        }
        assert!("paused".parse::<WorkspaceStatus>().is_err());
    }

    #[test]
    fn workspace_serde_defaults_links_to_empty() {
        let json = r#"{"id":"w","config":{"name":"n"},"status":"running"}"#;
        let ws: Workspace = serde_json::from_str(json).unwrap();
        assert!(ws.links.is_empty());
        assert_eq!(ws.status, WorkspaceStatus::Running);
    }
}
