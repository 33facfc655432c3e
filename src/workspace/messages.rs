//! User-facing notification and dialog strings.

pub const SUBSCRIBE_FAILED: &str = "Failed to subscribe to workspace events";
pub const WORKSPACE_STARTED: &str = "Workspace is running";
pub const WORKSPACE_START_FAILED: &str = "Workspace failed to start";
pub const WORKSPACE_STOPPED: &str = "Workspace stopped";
pub const START_ERROR_TITLE: &str = "Failed to start workspace";
pub const SNAPSHOT_IN_PROGRESS: &str = "Creating workspace snapshot...";

pub fn start_error_content(workspace_name: &str, error: &str) -> String {
    format!(
        "Workspace '{}' failed to start: {}. Pick another workspace to open.",
        workspace_name, error
    )
}

pub fn snapshot_error(message: &str) -> String {
    format!("Snapshot creation error: {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_error_content_names_workspace_and_cause() {
        let content = start_error_content("dev", "agent crashed");
        assert!(content.contains("'dev'"));
        assert!(content.contains("agent crashed"));
    }
}
