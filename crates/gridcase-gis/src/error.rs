//! Error types for layer access

use std::path::PathBuf;

/// Raster layer errors
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// File could not be read
    #[error("error opening raster file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Header line missing or malformed
    #[error("raster {path}: malformed header: {detail}")]
    Header { path: PathBuf, detail: String },

    /// Cell payload does not match the declared dimensions
    #[error("raster {path}: expected {expected} cells, found {found}")]
    CellCount {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    /// A cell value failed to parse
    #[error("raster {path}: invalid cell value {value:?}")]
    CellValue { path: PathBuf, value: String },
}

/// Vector layer errors
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    /// File could not be read
    #[error("error opening vector file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not parseable as GeoJSON
    #[error("vector {path}: invalid GeoJSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// GeoJSON parsed but is not a point feature collection
    #[error("vector {path}: {detail}")]
    Geometry { path: PathBuf, detail: String },
}
