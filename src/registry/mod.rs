//! Plugin registry.

pub mod plugin;

pub use plugin::{PluginInfo, PluginRegistry};
