//! Tool plugins for the scholar agent.
//!
//! A plugin is anything the agent can call by name during a turn. The
//! registry gates registration on granted permissions.

mod plugin;
mod registry;

pub use plugin::{Permission, Plugin, PluginError, PluginOutput, Result};
pub use registry::PluginRegistry;
