//! External model execution
//!
//! Walks the generated case tree, invokes the external binary once per
//! discovered case (or batch manifest), classifies each run by its
//! captured output, and folds everything into a batch report. Failures
//! are recorded, hooked, and never abort the remaining items.

pub mod discover;
pub mod engine;
pub mod error;
pub mod runner;

pub use discover::{discover_cases, export_runlist};
pub use engine::{classify, execute, execute_with};
pub use error::ExecError;
pub use runner::{CaseRunner, ModelRunner};
