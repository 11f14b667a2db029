use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unknown plugin: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, PluginError>;

/// Capabilities a plugin needs in order to run.
///
/// Retrieval tools reach out to the network for live documents and write
/// what they fetched back into the local cache, so they need both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permission {
    /// Read local state (caches, files)
    pub read: bool,
    /// Write local state
    pub write: bool,
    /// Call external services
    pub network: bool,
}

impl Permission {
    pub const READ_ONLY: Self = Self {
        read: true,
        write: false,
        network: false,
    };

    pub const RETRIEVAL: Self = Self {
        read: true,
        write: true,
        network: true,
    };

    pub const ALL: Self = Self::RETRIEVAL;

    pub const NONE: Self = Self {
        read: false,
        write: false,
        network: false,
    };

    /// Check if this permission allows the required permission.
    pub fn allows(&self, required: &Permission) -> bool {
        (!required.read || self.read)
            && (!required.write || self.write)
            && (!required.network || self.network)
    }
}

/// Output from plugin execution.
///
/// `content` is what the agent sees as the observation; `metadata` carries a
/// structured copy for callers that want more than text.
#[derive(Debug, Clone)]
pub struct PluginOutput {
    pub content: String,
    pub metadata: Option<Value>,
}

impl PluginOutput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl fmt::Display for PluginOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.content)
    }
}

/// Core trait that all plugins must implement.
///
/// From the agent's perspective plugins are "tools": it sees each one's name
/// and description in its prompt and may call them by name with a single
/// free-text input.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique identifier the agent uses to call the plugin.
    fn name(&self) -> &str;

    /// Shown to the agent to help it decide when to use this plugin.
    fn description(&self) -> &str;

    /// JSON schema of the plugin's parameters.
    fn parameter_schema(&self) -> Value;

    /// Permissions required to execute this plugin.
    fn required_permission(&self) -> Permission;

    /// Execute the plugin. The input should match the parameter schema.
    async fn execute(&self, input: Value) -> Result<PluginOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_allows() {
        assert!(Permission::RETRIEVAL.allows(&Permission::READ_ONLY));
        assert!(!Permission::READ_ONLY.allows(&Permission::RETRIEVAL));
        assert!(Permission::NONE.allows(&Permission::NONE));
    }

    #[test]
    fn test_output_display() {
        let output = PluginOutput::new("two documents").with_metadata(serde_json::json!([]));
        assert_eq!(output.to_string(), "two documents");
        assert!(output.metadata.is_some());
    }
}
