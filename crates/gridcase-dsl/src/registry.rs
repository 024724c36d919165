//! The function registry
//!
//! An explicit verb→callable table, populated once at startup. Dynamic
//! name lookup is confined to this map: an unknown flat verb is a
//! declared error, surfaced either upfront by [`FunctionRegistry::
//! validate_scenario`] or at resolution time as the verb's own failure.

use std::collections::HashMap;
use std::sync::Arc;

use gridcase_core::scenario::SITES_FIELD;
use gridcase_core::{Config, FieldMap, Scenario};

use crate::cache::Caches;
use crate::error::FunctionError;
use crate::expr::Expression;
use crate::functions;

/// Everything a verb gets to work with
///
/// The context is the partially built field map for the current site:
/// verbs read what earlier fields produced and return a partial map of
/// their own to merge.
pub struct FunctionInput<'a> {
    /// The scenario field being resolved
    pub key: &'a str,
    /// The parsed expression of that field
    pub expr: &'a Expression,
    /// The full scenario definition
    pub scenario: &'a Scenario,
    /// The context accumulated so far
    pub context: &'a FieldMap,
    /// Whole-run configuration
    pub config: &'a Config,
    /// Shared read-only lookup caches
    pub caches: &'a Caches,
}

/// A registered verb implementation
pub type VerbFn =
    Arc<dyn Fn(&FunctionInput<'_>) -> Result<FieldMap, FunctionError> + Send + Sync>;

/// Verb name → implementation table
pub struct FunctionRegistry {
    table: HashMap<String, VerbFn>,
}

impl FunctionRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in verb
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("auto_planting_window", Arc::new(functions::auto_planting_window));
        registry.register(
            "auto_planting_window_doy",
            Arc::new(functions::auto_planting_window_doy),
        );
        registry.register(
            "auto_planting_window_doy_shape",
            Arc::new(functions::auto_planting_window_doy_shape),
        );
        registry.register("lookup_hc27", Arc::new(functions::lookup_hc27));
        registry.register("lookup_wth", Arc::new(functions::lookup_wth));
        registry.register("lookup_soil_profile", Arc::new(functions::lookup_soil_profile));
        registry.register("generate_ic_layers", Arc::new(functions::generate_ic_layers));
        registry.register(
            "split_fert_dap_percent",
            Arc::new(functions::split_fert_dap_percent),
        );
        registry.register(
            "assign_by_raster_value",
            Arc::new(functions::assign_by_raster_value),
        );
        registry.register("date_from_doy_raster", Arc::new(functions::date_from_doy_raster));
        registry.register("date_offset", Arc::new(functions::date_offset));
        registry
    }

    /// Register (or replace) a verb implementation
    pub fn register(&mut self, name: impl Into<String>, verb: VerbFn) {
        self.table.insert(name.into(), verb);
    }

    /// Look up a verb
    ///
    /// # Errors
    /// Returns [`FunctionError::UnknownVerb`] for names not registered.
    pub fn get(&self, verb: &str) -> Result<&VerbFn, FunctionError> {
        self.table
            .get(verb)
            .ok_or_else(|| FunctionError::UnknownVerb(verb.to_string()))
    }

    /// Whether a verb is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, verb: &str) -> bool {
        self.table.contains_key(verb)
    }

    /// Number of registered verbs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Unknown flat verbs referenced by a scenario
    ///
    /// Walks every expression field the resolver would walk (skipping
    /// the site source, bare layer sources, and reserved dotted names)
    /// and collects verbs the registry does not know. An empty result
    /// means the scenario will never hit an unknown-verb failure at
    /// runtime.
    #[must_use]
    pub fn unknown_verbs(&self, scenario: &Scenario) -> Vec<String> {
        let mut unknown = Vec::new();
        for (key, value) in scenario.fields() {
            if key == SITES_FIELD {
                continue;
            }
            let Some(expr) = value.as_str().and_then(Expression::parse) else {
                continue;
            };
            if expr.is_layer_source() || expr.is_dotted() {
                continue;
            }
            if !self.contains(expr.verb()) && !unknown.iter().any(|v| v == expr.verb()) {
                unknown.push(expr.verb().to_string());
            }
        }
        unknown
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.table.keys().collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry").field("verbs", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scenario(fields: &[(&str, serde_json::Value)]) -> Scenario {
        let map: FieldMap = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Scenario::new("test", "/tmp/work", map)
    }

    #[test]
    fn builtins_are_registered() {
        let registry = FunctionRegistry::with_builtins();
        assert!(registry.contains("date_offset"));
        assert!(registry.contains("lookup_hc27"));
        assert!(registry.contains("generate_ic_layers"));
        assert!(!registry.contains("no_such_verb"));
    }

    #[test]
    fn unknown_verb_is_a_declared_error() {
        let registry = FunctionRegistry::with_builtins();
        let err = registry.get("no_such_verb").err().unwrap();
        assert!(matches!(err, FunctionError::UnknownVerb(name) if name == "no_such_verb"));
    }

    #[test]
    fn unknown_verbs_scans_expression_fields_only() {
        let registry = FunctionRegistry::with_builtins();
        let s = scenario(&[
            ("sites", json!("vector::sites.json")),
            ("soilClass", json!("raster::soil.asc")),
            ("pdate", json!("date_offset::$hdate::-120")),
            ("custom", json!("myplugin.custom::1")),
            ("typo", json!("date_offfset::$hdate::-120")),
            ("literal", json!("no expression here")),
        ]);

        assert_eq!(registry.unknown_verbs(&s), vec!["date_offfset"]);
    }
}
