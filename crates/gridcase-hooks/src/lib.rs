//! Plugin hook framework
//!
//! A closed set of extension points brackets the pipeline. Plugins
//! register ordered callables per point; every invocation folds the
//! registered chain left-to-right over a per-point accumulator, so a
//! later plugin sees what an earlier one produced. A point with no
//! registrations returns its seed unchanged.
//!
//! Every hook point has exactly one accumulator shape, encoded as a
//! [`HookData`] variant. Field-map payloads merge key-wise; record
//! payloads replace; a context hook returning
//! [`ContextState::Skipped`](gridcase_core::ContextState) vetoes the
//! site for good.

pub mod data;
pub mod loader;
pub mod point;
pub mod registry;

pub use data::HookData;
pub use loader::{load_plugins, PluginCatalog, PluginInit};
pub use point::HookPoint;
pub use registry::{HookFn, HookRegistry};
