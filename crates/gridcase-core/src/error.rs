//! Configuration errors
//!
//! Everything here is fatal before any work starts: a run with a broken
//! configuration never reaches the sampler.

use std::path::PathBuf;

use gridcase_gis::RasterError;

/// Errors raised while loading or validating a run configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("error opening configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON
    #[error("invalid configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No runs defined
    #[error("configuration defines no runs")]
    NoRuns,

    /// A run is missing a required field
    #[error("run {run:?} is missing required field {field:?}")]
    MissingField { run: String, field: String },

    /// A referenced raster layer could not be opened
    #[error(transparent)]
    Layer(#[from] RasterError),

    /// Raster layers disagree on resolution or alignment
    #[error("layer {layer}: {detail}")]
    LayerMismatch { layer: String, detail: String },

    /// Scenario expressions reference verbs the registry does not know
    #[error("unknown verbs in scenario {run:?}: {verbs:?}")]
    UnknownVerbs { run: String, verbs: Vec<String> },

    /// Model executable missing or not configured
    #[error("model executable is not configured")]
    MissingExecutable,
}
