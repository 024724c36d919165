//! Per-site context resolution
//!
//! Seeds the context from scenario ∪ site record, then walks the
//! scenario's fields in declaration order, resolving each expression
//! through the registry and merging its partial output back in.
//! Dependencies are declaration-order: a field may reference anything an
//! earlier field produced, and nothing later. There is no cycle
//! detection; a forward reference fails inside the verb that reads it.
//!
//! The first failing verb ends resolution for the site — the remaining
//! fields are never evaluated and the site reports
//! [`ContextState::Skipped`].

use tracing::error;

use gridcase_core::scenario::SITES_FIELD;
use gridcase_core::{merge_fields, Config, ContextState, Scenario, SiteRecord};

use crate::cache::Caches;
use crate::expr::Expression;
use crate::registry::{FunctionInput, FunctionRegistry};

/// Resolve one site's context
///
/// Returns `Resolved` with the full field map, or `Skipped` when any
/// verb signals failure. Skips are logged, counted by the caller, and
/// never fatal to the batch.
#[must_use]
pub fn build_context(
    scenario: &Scenario,
    site: &SiteRecord,
    registry: &FunctionRegistry,
    config: &Config,
    caches: &Caches,
) -> ContextState {
    build_context_seeded(scenario, site.seed_fields(), registry, config, caches)
}

/// Resolve a context from pre-assembled site fields
///
/// The seed is what the site contributes on top of the scenario —
/// normally [`SiteRecord::seed_fields`], possibly enriched by a
/// pre-build hook.
#[must_use]
pub fn build_context_seeded(
    scenario: &Scenario,
    seed: gridcase_core::FieldMap,
    registry: &FunctionRegistry,
    config: &Config,
    caches: &Caches,
) -> ContextState {
    let mut context = scenario.fields().clone();
    merge_fields(&mut context, seed);

    for (key, value) in scenario.fields() {
        if key == SITES_FIELD {
            continue;
        }
        let Some(expr) = value.as_str().and_then(Expression::parse) else {
            continue;
        };
        // Bare layer sources were consumed by the sampler; dotted verbs
        // belong to a plugin function loader, not this resolver.
        if expr.is_layer_source() || expr.is_dotted() {
            continue;
        }

        let verb = match registry.get(expr.verb()) {
            Ok(verb) => verb,
            Err(err) => {
                error!(field = %key, error = %err, "skipping site");
                return ContextState::Skipped;
            }
        };
        let input = FunctionInput {
            key,
            expr: &expr,
            scenario,
            context: &context,
            config,
            caches,
        };
        match verb(&input) {
            Ok(partial) => merge_fields(&mut context, partial),
            Err(err) => {
                error!(field = %key, error = %err, "failed function, skipping site");
                return ContextState::Skipped;
            }
        }
    }
    ContextState::Resolved(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FunctionError;
    use crate::registry::VerbFn;
    use gridcase_core::FieldMap;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn scenario(fields: &[(&str, Value)]) -> Scenario {
        let map: FieldMap = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Scenario::new("test", "/tmp/work", map)
    }

    fn site() -> SiteRecord {
        let mut site = SiteRecord::new(7.25, -3.5);
        site.layers.insert("soilClass".to_string(), json!(12));
        site
    }

    /// Emits its single argument as a number under the field key
    fn emit_verb() -> VerbFn {
        Arc::new(|input| {
            let n: i64 = input
                .expr
                .arg(0)
                .and_then(|a| a.parse().ok())
                .ok_or_else(|| FunctionError::invalid(input.key, "not a number"))?;
            let mut out = FieldMap::new();
            out.insert(input.key.to_string(), json!(n));
            Ok(out)
        })
    }

    /// Copies a `$`-referenced context value, failing unless it is a number
    fn copy_num_verb() -> VerbFn {
        Arc::new(|input| {
            let arg = input.expr.arg(0).unwrap_or_default();
            let key = arg.strip_prefix('$').unwrap_or(arg);
            let value = input
                .context
                .get(key)
                .ok_or_else(|| FunctionError::MissingContextKey {
                    field: input.key.to_string(),
                    key: key.to_string(),
                })?;
            if !value.is_number() {
                return Err(FunctionError::invalid(input.key, "reference is not resolved"));
            }
            let mut out = FieldMap::new();
            out.insert(input.key.to_string(), value.clone());
            Ok(out)
        })
    }

    fn failing_verb() -> VerbFn {
        Arc::new(|input| Err(FunctionError::invalid(input.key, "always fails")))
    }

    fn counting_verb(counter: Arc<AtomicUsize>) -> VerbFn {
        Arc::new(move |input| {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut out = FieldMap::new();
            out.insert(input.key.to_string(), json!("touched"));
            Ok(out)
        })
    }

    fn registry_with(extra: &[(&str, VerbFn)]) -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        for (name, verb) in extra {
            registry.register(*name, Arc::clone(verb));
        }
        registry
    }

    #[test]
    fn seeds_scenario_and_site_fields() {
        let registry = FunctionRegistry::new();
        let s = scenario(&[("template", json!("M.CSX")), ("startYear", json!(1984))]);

        let state = build_context(&s, &site(), &registry, &Config::default(), &Caches::new());
        let fields = state.into_fields().unwrap();

        assert_eq!(fields["template"], json!("M.CSX"));
        assert_eq!(fields["lat"], json!(7.25));
        assert_eq!(fields["xcrd"], json!(-3.5));
        assert_eq!(fields["soilClass"], json!(12));
    }

    #[test]
    fn earlier_fields_feed_later_ones() {
        let registry = registry_with(&[("emit", emit_verb()), ("copy_num", copy_num_verb())]);
        let s = scenario(&[
            ("x", json!("emit::41")),
            ("y", json!("copy_num::$x")),
        ]);

        let state = build_context(&s, &site(), &registry, &Config::default(), &Caches::new());
        let fields = state.into_fields().unwrap();

        assert_eq!(fields["y"], json!(41));
    }

    #[test]
    fn forward_references_fail_the_site() {
        let registry = registry_with(&[("emit", emit_verb()), ("copy_num", copy_num_verb())]);
        // y references x, but x only resolves after y
        let s = scenario(&[
            ("y", json!("copy_num::$x")),
            ("x", json!("emit::41")),
        ]);

        let state = build_context(&s, &site(), &registry, &Config::default(), &Caches::new());
        assert_eq!(state, ContextState::Skipped);
    }

    #[test]
    fn failure_stops_evaluation_of_later_fields() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = registry_with(&[
            ("boom", failing_verb()),
            ("touch", counting_verb(Arc::clone(&counter))),
        ]);
        let s = scenario(&[
            ("a", json!("boom::now")),
            ("b", json!("touch::me")),
        ]);

        let state = build_context(&s, &site(), &registry, &Config::default(), &Caches::new());

        assert_eq!(state, ContextState::Skipped);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn evaluation_order_is_declaration_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = registry_with(&[
            ("touch", counting_verb(Arc::clone(&counter))),
            ("boom", failing_verb()),
        ]);
        let s = scenario(&[
            ("a", json!("touch::me")),
            ("b", json!("boom::now")),
            ("c", json!("touch::me::again")),
        ]);

        let state = build_context(&s, &site(), &registry, &Config::default(), &Caches::new());

        assert_eq!(state, ContextState::Skipped);
        // only the field before the failure ran
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_verb_skips_the_site() {
        let registry = FunctionRegistry::new();
        let s = scenario(&[("a", json!("no_such_verb::1"))]);

        let state = build_context(&s, &site(), &registry, &Config::default(), &Caches::new());
        assert_eq!(state, ContextState::Skipped);
    }

    #[test]
    fn layer_sources_dotted_verbs_and_sites_are_untouched() {
        let registry = FunctionRegistry::new();
        let s = scenario(&[
            ("sites", json!("vector::sites.json")),
            ("soilClass", json!("raster::soil.asc")),
            ("custom", json!("myplugin.verb::1")),
        ]);

        let state = build_context(&s, &site(), &registry, &Config::default(), &Caches::new());
        let fields = state.into_fields().unwrap();

        // untouched: kept as written, sampled layer value wins for soilClass
        assert_eq!(fields["sites"], json!("vector::sites.json"));
        assert_eq!(fields["soilClass"], json!(12));
        assert_eq!(fields["custom"], json!("myplugin.verb::1"));
    }
}
