//! Scenario expression language
//!
//! Scenario fields whose value looks like `verb::arg1::arg2::...` are
//! expressions: the verb names a function in the [`FunctionRegistry`],
//! the arguments are literals, `$`-prefixed context references, or a
//! `raster`/`vector` layer source. The [`resolve`] engine walks a
//! scenario's fields in declaration order and folds each verb's output
//! into the growing per-site context, failing fast on the first verb
//! that signals failure.
//!
//! Dotted verb names are reserved for plugin-supplied functions and are
//! deliberately left unresolved by this crate.

pub mod cache;
pub mod dates;
pub mod error;
pub mod expr;
pub mod functions;
pub mod registry;
pub mod resolve;
pub mod soil;

pub use cache::Caches;
pub use error::FunctionError;
pub use expr::{context_ref, is_expression, Expression};
pub use registry::{FunctionInput, FunctionRegistry, VerbFn};
pub use resolve::{build_context, build_context_seeded};
