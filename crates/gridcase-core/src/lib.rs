//! gridcase core types
//!
//! The shared vocabulary of the pipeline:
//! - [`Config`]: whole-run configuration loaded from JSON
//! - [`Scenario`]: one merged run definition, fields in declaration order
//! - [`FieldMap`]: the ordered field→value map that scenarios, contexts,
//!   and hook payloads are made of
//! - the records that flow between stages ([`SiteRecord`],
//!   [`ContextState`], [`CaseFile`], [`ExecutionRecord`], [`RunReport`])

pub mod config;
pub mod error;
pub mod record;
pub mod scenario;

pub use config::{Config, ModelConfig, PluginSpec, RunMode};
pub use error::ConfigError;
pub use record::{CaseFile, ContextState, ExecutionRecord, Outcome, RunReport, SiteRecord};
pub use scenario::Scenario;

use serde_json::Value;

/// Ordered field→value map
///
/// Declaration order is semantic: the resolution engine walks scenario
/// fields in the order they were written, so later fields may reference
/// values produced by earlier ones.
pub type FieldMap = indexmap::IndexMap<String, Value>;

/// Merge `src` into `dst` key-wise; `src` wins on collision
pub fn merge_fields(dst: &mut FieldMap, src: FieldMap) {
    for (k, v) in src {
        dst.insert(k, v);
    }
}

/// Borrow a field value as a string slice
#[inline]
#[must_use]
pub fn value_str(value: &Value) -> Option<&str> {
    value.as_str()
}

/// Convert a JSON object into a [`FieldMap`], preserving order
#[must_use]
pub fn object_to_fields(object: &serde_json::Map<String, Value>) -> FieldMap {
    object.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}
