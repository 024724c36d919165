//! Geospatial layer access for gridcase
//!
//! Provides the low-level readers the pipeline samples sites from:
//! - ASCII grid rasters, loaded whole and sampled per cell
//! - GeoJSON point layers with exact-match and nearest-point lookup
//! - The coordinate→path codec used for case directory layout
//!
//! All coordinates are (longitude, latitude) in layer units; nothing in
//! this crate assumes a geodesic datum. Nearest-point lookups use a
//! squared-Euclidean ordering proxy, not a real distance.

pub mod coords;
pub mod error;
pub mod raster;
pub mod vector;

pub use coords::{decode_segment, lat_segment, lng_segment, news_path, sq_dist};
pub use error::{RasterError, VectorError};
pub use raster::{AsciiGrid, GridProfile};
pub use vector::{PointIndex, VectorIndexCache};
