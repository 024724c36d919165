//! Case template rendering
//!
//! Case files are fixed-layout text; templates are handlebars with HTML
//! escaping disabled. The model side expects aligned numeric columns,
//! so a fixed-width formatting table is applied to the context before
//! rendering: known keys become right-aligned strings of their declared
//! width (floats to one decimal, strings truncated), both at the top
//! level and inside lists of records (initial-condition layers,
//! treatments).

use std::path::Path;

use handlebars::Handlebars;
use serde_json::Value;

use gridcase_core::FieldMap;

use crate::error::ComposeError;

/// (key, column width) pairs the model's layout fixes
const FIELD_WIDTHS: &[(&str, usize)] = &[
    ("icrt", 5),
    ("icres", 5),
    ("icren", 5),
    ("icbl", 4),
    ("sh2o", 5),
    ("snh4", 5),
    ("sno3", 5),
];

/// A registered set of case templates
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl TemplateEngine {
    /// Create an engine with escaping disabled (output is plain text)
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        Self { registry }
    }

    /// Register a template file under its name
    ///
    /// # Errors
    /// Returns `ComposeError::TemplateLoad` when the file is missing or
    /// not a valid template.
    pub fn register_file(&mut self, name: &str, path: &Path) -> Result<(), ComposeError> {
        self.registry
            .register_template_file(name, path)
            .map_err(|e| ComposeError::TemplateLoad(Box::new(e)))
    }

    /// Whether a template name is registered
    #[inline]
    #[must_use]
    pub fn has_template(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }

    /// Render a template against a context
    ///
    /// The fixed-width formatting pass runs first; the template sees
    /// pre-aligned strings for the keys in the width table.
    ///
    /// # Errors
    /// Returns `ComposeError::Render` on unknown template or render
    /// failure.
    pub fn render(&self, name: &str, context: &FieldMap) -> Result<String, ComposeError> {
        let formatted = format_fields(context);
        Ok(self.registry.render(name, &formatted)?)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the fixed-width table to a context
#[must_use]
pub fn format_fields(fields: &FieldMap) -> FieldMap {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), format_value(key, value)))
        .collect()
}

fn format_value(key: &str, value: &Value) -> Value {
    if let Some(width) = width_of(key) {
        if let Some(formatted) = fixed_width(value, width) {
            return Value::String(formatted);
        }
    }
    // Format record lists element-wise so layer/treatment loops in the
    // template see aligned columns too
    if let Value::Array(items) = value {
        let formatted: Vec<Value> = items
            .iter()
            .map(|item| match item {
                Value::Object(record) => Value::Object(
                    record
                        .iter()
                        .map(|(k, v)| (k.clone(), format_value(k, v)))
                        .collect(),
                ),
                other => other.clone(),
            })
            .collect();
        return Value::Array(formatted);
    }
    value.clone()
}

fn width_of(key: &str) -> Option<usize> {
    FIELD_WIDTHS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, width)| *width)
}

fn fixed_width(value: &Value, width: usize) -> Option<String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(format!("{i:>width$}"))
            } else {
                n.as_f64().map(|f| format!("{f:>width$.1}"))
            }
        }
        Value::String(s) => Some(format!("{s:>width$.width$}")),
        _ => None,
    }
}
