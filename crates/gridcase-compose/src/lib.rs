//! Case composition
//!
//! Turns a scenario into on-disk simulation cases:
//! 1. the [`sampler`] joins the site source against every raster layer,
//!    dropping sites with missing data
//! 2. per site, the context is resolved (with hooks bracketing the
//!    build), the case directory is laid out under the coordinate path,
//!    inputs are linked in, and the case template is rendered
//! 3. the [`pool`] fans the per-site work over a bounded thread pool
//!
//! Everything here is idempotent on re-run: directories are
//! create-if-absent and links check-then-skip.

pub mod compose;
pub mod error;
pub mod pool;
pub mod sampler;
pub mod template;

pub use compose::{ComposeOutcome, Composer};
pub use error::{ComposeError, SampleError};
pub use pool::{run_pool, ComposeSummary};
pub use sampler::sample_sites;
pub use template::TemplateEngine;
