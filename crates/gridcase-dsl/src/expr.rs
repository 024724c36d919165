//! Expression grammar
//!
//! `verb::arg1::arg2::...` — a flat verb name followed by `::`-separated
//! arguments. An argument prefixed with `$` is a context reference; the
//! literal tokens `raster` and `vector` mark a layer source, with the
//! layer path (and, for vectors, the attribute name) following.

use serde_json::Value;

/// A parsed scenario expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    verb: String,
    args: Vec<String>,
}

impl Expression {
    /// Parse an expression string
    ///
    /// Returns `None` for strings that are not expressions (no `::`, or
    /// an empty verb); those are plain literal field values.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if !raw.contains("::") {
            return None;
        }
        let mut parts = raw.split("::");
        let verb = parts.next()?.trim();
        if verb.is_empty() {
            return None;
        }
        Some(Self {
            verb: verb.to_string(),
            args: parts.map(str::to_string).collect(),
        })
    }

    /// The verb name
    #[inline]
    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// All arguments, in order
    #[inline]
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// One argument by position
    #[inline]
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Whether the verb is dotted (reserved for plugin functions)
    #[inline]
    #[must_use]
    pub fn is_dotted(&self) -> bool {
        self.verb.contains('.')
    }

    /// Whether the verb is a bare layer source, not a function
    #[inline]
    #[must_use]
    pub fn is_layer_source(&self) -> bool {
        self.verb == "raster" || self.verb == "vector"
    }

    /// Position of the `raster` token among the arguments
    #[inline]
    #[must_use]
    pub fn raster_position(&self) -> Option<usize> {
        self.args.iter().position(|a| a == "raster")
    }

    /// Position of the `vector` token among the arguments
    #[inline]
    #[must_use]
    pub fn vector_position(&self) -> Option<usize> {
        self.args.iter().position(|a| a == "vector")
    }
}

/// Whether a field value is an expression
#[must_use]
pub fn is_expression(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| Expression::parse(s).is_some())
}

/// The context key named by a `$`-prefixed argument
#[must_use]
pub fn context_ref(arg: &str) -> Option<&str> {
    arg.strip_prefix('$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_splits_verb_and_args() {
        let expr = Expression::parse("date_offset::$pdate::-30").unwrap();
        assert_eq!(expr.verb(), "date_offset");
        assert_eq!(expr.args(), ["$pdate", "-30"]);
    }

    #[test]
    fn parse_rejects_non_expressions() {
        assert!(Expression::parse("plain value").is_none());
        assert!(Expression::parse("::no_verb").is_none());
        assert!(Expression::parse("").is_none());
    }

    #[test]
    fn layer_source_tokens_are_positional() {
        let expr =
            Expression::parse("assign_by_raster_value::raster::lut.asc::1::IB0001").unwrap();
        assert_eq!(expr.raster_position(), Some(0));
        assert_eq!(expr.arg(1), Some("lut.asc"));
        assert!(expr.vector_position().is_none());
    }

    #[test]
    fn dotted_verbs_are_reserved() {
        let expr = Expression::parse("myplugin.custom::1").unwrap();
        assert!(expr.is_dotted());

        let flat = Expression::parse("lookup_hc27::raster::x.asc").unwrap();
        assert!(!flat.is_dotted());
    }

    #[test]
    fn bare_layer_sources_are_not_functions() {
        assert!(Expression::parse("raster::soil.asc").unwrap().is_layer_source());
        assert!(Expression::parse("vector::sites.json").unwrap().is_layer_source());
        assert!(!Expression::parse("lookup_wth::NGST::vector::c.json::ID")
            .unwrap()
            .is_layer_source());
    }

    #[test]
    fn expression_detection_on_values() {
        assert!(is_expression(&json!("date_offset::$pdate::-30")));
        assert!(!is_expression(&json!("1984-03-15")));
        assert!(!is_expression(&json!(42)));
    }

    #[test]
    fn context_refs_strip_the_sigil() {
        assert_eq!(context_ref("$pdate"), Some("pdate"));
        assert_eq!(context_ref("pdate"), None);
    }
}
