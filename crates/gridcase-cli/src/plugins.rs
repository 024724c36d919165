//! Compiled-in plugins
//!
//! The catalog maps configuration names to initialization entry points.
//! Each plugin's `initialize` receives its own parameters, the registry
//! built so far, and the full configuration, and returns the extended
//! registry.

use gridcase_hooks::{PluginCatalog, PluginInit};

/// Every plugin this build knows about
pub(crate) fn catalog() -> PluginCatalog {
    let mut catalog = PluginCatalog::new();
    catalog.insert("field_override", field_override::initialize as PluginInit);
    catalog
}

/// Overrides context fields after every successful build
///
/// Configuration: `{"plugin": "field_override", "params": {"fields":
/// {"key": value, ...}}}`. Useful for sensitivity runs that force a
/// parameter across the whole grid without editing the scenario.
mod field_override {
    use std::sync::Arc;

    use serde_json::Value;
    use tracing::info;

    use gridcase_core::{Config, ContextState, FieldMap};
    use gridcase_hooks::{HookData, HookPoint, HookRegistry};

    pub(crate) fn initialize(
        params: &FieldMap,
        mut registry: HookRegistry,
        _full_config: &Config,
    ) -> HookRegistry {
        info!("initializing field_override plugin");
        registry.register(
            HookPoint::PostBuildContext,
            Arc::new(override_fields),
            params.clone(),
        );
        registry
    }

    fn override_fields(config: &FieldMap, data: HookData) -> HookData {
        let HookData::Context(ContextState::Resolved(mut fields)) = data else {
            return data;
        };
        if let Some(Value::Object(overrides)) = config.get("fields") {
            for (key, value) in overrides {
                fields.insert(key.clone(), value.clone());
            }
        }
        HookData::Context(ContextState::Resolved(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcase_core::{Config, ContextState, FieldMap, PluginSpec};
    use gridcase_hooks::{load_plugins, HookData, HookPoint};
    use serde_json::json;

    #[test]
    fn field_override_rewrites_resolved_contexts() {
        let params: FieldMap = [(
            "fields".to_string(),
            json!({"pdate": "1990-01-01"}),
        )]
        .into_iter()
        .collect();
        let config = Config {
            plugins: vec![PluginSpec {
                plugin: "field_override".to_string(),
                params,
            }],
            ..Config::default()
        };

        let registry = load_plugins(&config, &catalog());
        assert_eq!(registry.count(HookPoint::PostBuildContext), 1);

        let seed: FieldMap = [("pdate".to_string(), json!("1984-03-15"))]
            .into_iter()
            .collect();
        let out = registry.run(
            HookPoint::PostBuildContext,
            HookData::Context(ContextState::Resolved(seed)),
        );

        let ContextState::Resolved(fields) = out.into_context().unwrap() else {
            panic!("context should stay resolved");
        };
        assert_eq!(fields["pdate"], json!("1990-01-01"));
    }

    #[test]
    fn field_override_leaves_skipped_contexts_alone() {
        let config = Config {
            plugins: vec![PluginSpec {
                plugin: "field_override".to_string(),
                params: FieldMap::new(),
            }],
            ..Config::default()
        };
        let registry = load_plugins(&config, &catalog());

        let out = registry.run(
            HookPoint::PostBuildContext,
            HookData::Context(ContextState::Skipped),
        );
        assert_eq!(out.into_context(), Some(ContextState::Skipped));
    }
}
