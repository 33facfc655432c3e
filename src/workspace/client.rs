//! Paged retrieval of the user's workspaces from the workspace master.

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::model::Workspace;

#[async_trait]
pub trait WorkspaceClient: Send + Sync {
    /// Fetch an ordered page of the user's workspaces.
    async fn list(&self, skip: usize, max_items: usize) -> Result<Vec<Workspace>>;
}

/// REST implementation against the workspace master API.
pub struct HttpWorkspaceClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpWorkspaceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl WorkspaceClient for HttpWorkspaceClient {
    async fn list(&self, skip: usize, max_items: usize) -> Result<Vec<Workspace>> {
        let url = format!(
            "{}/api/workspace?skip={}&maxItems={}",
            self.base_url, skip, max_items
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch workspaces from {}", url))?
            .error_for_status()
            .context("Workspace list request was rejected")?;
        response
            .json::<Vec<Workspace>>()
            .await
            .context("Failed to decode workspace list")
    }
}
