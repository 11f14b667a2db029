use crate::{Permission, Plugin, PluginError, PluginOutput};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry for managing plugins.
///
/// The registry is responsible for:
/// - Registering plugins with permission checking
/// - Looking up plugins by name
/// - Executing plugins
/// - Describing plugins to the agent
///
/// Plugins are kept ordered by name so prompts render the same way every run.
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn Plugin>>,
    granted_permissions: Permission,
}

impl PluginRegistry {
    /// Create a new plugin registry with the given permissions.
    pub fn new(granted_permissions: Permission) -> Self {
        Self {
            plugins: BTreeMap::new(),
            granted_permissions,
        }
    }

    /// Register a plugin if permissions allow.
    /// Returns true if the plugin was registered, false if denied by permissions.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> bool {
        let required = plugin.required_permission();

        if !self.granted_permissions.allows(&required) {
            return false;
        }

        self.plugins.insert(plugin.name().to_string(), plugin);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(|name| name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Execute a plugin by name.
    pub async fn execute(&self, name: &str, input: Value) -> Result<PluginOutput, PluginError> {
        let plugin = self
            .get(name)
            .ok_or_else(|| PluginError::Unknown(name.to_string()))?;

        plugin.execute(input).await
    }

    /// One `name: description` line per plugin, for text prompts.
    pub fn describe(&self) -> String {
        self.plugins
            .values()
            .map(|plugin| format!("{}: {}", plugin.name(), plugin.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Plugin specifications as JSON tool definitions.
    pub fn plugin_specs(&self) -> Vec<Value> {
        self.plugins
            .values()
            .map(|plugin| {
                serde_json::json!({
                    "name": plugin.name(),
                    "description": plugin.description(),
                    "parameters": plugin.parameter_schema(),
                })
            })
            .collect()
    }
}
