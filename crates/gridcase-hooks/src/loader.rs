//! Plugin loading
//!
//! Plugins are compiled in and selected by name from the configuration's
//! `plugins` list. Each plugin exposes one initialization entry point
//! that receives its own parameters, the registry built so far, and the
//! full configuration, and returns the extended registry. A name the
//! catalog does not know is skipped with a warning; a broken plugin
//! never takes the run down.

use std::collections::HashMap;

use gridcase_core::{Config, FieldMap};
use tracing::{info, warn};

use crate::registry::HookRegistry;

/// A plugin's initialization entry point
pub type PluginInit = fn(&FieldMap, HookRegistry, &Config) -> HookRegistry;

/// Name → entry point table of available plugins
pub type PluginCatalog = HashMap<&'static str, PluginInit>;

/// Initialize every configured plugin, in configuration order
#[must_use]
pub fn load_plugins(config: &Config, catalog: &PluginCatalog) -> HookRegistry {
    let mut registry = HookRegistry::new();
    if config.plugins.is_empty() {
        info!("no plugins required");
        return registry;
    }
    for spec in &config.plugins {
        let Some(init) = catalog.get(spec.plugin.as_str()) else {
            warn!(plugin = %spec.plugin, "cannot find plugin");
            continue;
        };
        info!(plugin = %spec.plugin, "initializing plugin");
        registry = init(&spec.params, registry, config);
    }
    registry
}
