//! Sampling and composition errors

use std::path::PathBuf;

use gridcase_gis::{RasterError, VectorError};

/// Errors while producing site records
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// The scenario has no usable `sites` field
    #[error("run {run:?} has no usable site source")]
    MissingSites { run: String },

    /// A raster layer failed to open
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// The vector site source failed to load
    #[error(transparent)]
    Vector(#[from] VectorError),
}

/// Errors while composing one site's cases
///
/// These are fatal for the site only; the pool records them and the
/// batch continues.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// Case template failed to register
    #[error("template: {0}")]
    TemplateLoad(#[from] Box<handlebars::TemplateError>),

    /// Case template failed to render
    #[error("render: {0}")]
    Render(#[from] handlebars::RenderError),

    /// Filesystem failure in the case directory
    #[error("case io {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The resolved context lacks a required field
    #[error("context is missing {field:?}")]
    MissingField { field: String },
}

impl ComposeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
