//! GeoJSON point layers
//!
//! Site sources and station layers (weather cells, planting-date zones)
//! are GeoJSON FeatureCollections of Point or MultiPoint features. A
//! [`PointIndex`] holds every coordinate with its feature properties and
//! an exact-match table keyed by the raw coordinate bits; lookups fall
//! back to a full nearest-neighbor scan on miss. Indexes are built once
//! per file and shared through [`VectorIndexCache`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::coords::sq_dist;
use crate::error::VectorError;

/// Exact-match key: the raw bit patterns of (lng, lat)
///
/// Matches only coordinates that are byte-identical to the file's, which
/// is what "exact" means for a site list cut from the same source.
fn bits(lng: f64, lat: f64) -> (u64, u64) {
    (lng.to_bits(), lat.to_bits())
}

/// All points of one vector file, with their feature properties
#[derive(Debug)]
pub struct PointIndex {
    points: Vec<(f64, f64)>,
    props: Vec<Arc<Map<String, Value>>>,
    exact: HashMap<(u64, u64), usize>,
}

impl PointIndex {
    /// Load and index a GeoJSON point file
    ///
    /// MultiPoint features contribute one entry per coordinate, each
    /// sharing the feature's properties.
    ///
    /// # Errors
    /// Returns `VectorError` if the file is unreadable, not JSON, or not
    /// a point feature collection.
    pub fn load(path: &Path) -> Result<Self, VectorError> {
        let text = fs::read_to_string(path).map_err(|source| VectorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let root: Value = serde_json::from_str(&text).map_err(|source| VectorError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        let features = root
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| geometry_error(path, "missing features array"))?;

        let mut points = Vec::new();
        let mut props: Vec<Arc<Map<String, Value>>> = Vec::new();
        for feature in features {
            let properties = Arc::new(
                feature
                    .get("properties")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
            );
            let geometry = feature
                .get("geometry")
                .ok_or_else(|| geometry_error(path, "feature without geometry"))?;
            let kind = geometry.get("type").and_then(Value::as_str).unwrap_or("");
            let coordinates = geometry
                .get("coordinates")
                .ok_or_else(|| geometry_error(path, "geometry without coordinates"))?;
            match kind {
                "Point" => {
                    let pair = read_pair(path, coordinates)?;
                    points.push(pair);
                    props.push(properties);
                }
                "MultiPoint" => {
                    let list = coordinates
                        .as_array()
                        .ok_or_else(|| geometry_error(path, "MultiPoint without array"))?;
                    for entry in list {
                        points.push(read_pair(path, entry)?);
                        props.push(Arc::clone(&properties));
                    }
                }
                // Non-point features are simply not sites
                _ => continue,
            }
        }

        let exact = points
            .iter()
            .enumerate()
            .map(|(i, &(lng, lat))| (bits(lng, lat), i))
            .collect();

        Ok(Self {
            points,
            props,
            exact,
        })
    }

    /// Every (lng, lat) coordinate in file order
    #[inline]
    #[must_use]
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Number of indexed points
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the file held no points
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of the point at exactly (lng, lat), if present
    #[inline]
    #[must_use]
    pub fn exact(&self, lng: f64, lat: f64) -> Option<usize> {
        self.exact.get(&bits(lng, lat)).copied()
    }

    /// Index of the nearest point by the squared-Euclidean proxy
    #[must_use]
    pub fn nearest(&self, lng: f64, lat: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &(plng, plat)) in self.points.iter().enumerate() {
            let d = sq_dist(lat, lng, plat, plng);
            match best {
                Some((_, bd)) if bd <= d => {}
                _ => best = Some((i, d)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Property value of the indexed point
    #[inline]
    #[must_use]
    pub fn attribute(&self, index: usize, name: &str) -> Option<&Value> {
        self.props.get(index).and_then(|p| p.get(name))
    }

    /// Property of the point at (lng, lat): exact match first, nearest
    /// scan on miss
    #[must_use]
    pub fn find_attribute(&self, lng: f64, lat: f64, name: &str) -> Option<&Value> {
        let index = self.exact(lng, lat).or_else(|| self.nearest(lng, lat))?;
        self.attribute(index, name)
    }
}

fn read_pair(path: &Path, value: &Value) -> Result<(f64, f64), VectorError> {
    let pair = value
        .as_array()
        .filter(|a| a.len() >= 2)
        .ok_or_else(|| geometry_error(path, "coordinate is not an [lng, lat] pair"))?;
    let lng = pair[0]
        .as_f64()
        .ok_or_else(|| geometry_error(path, "non-numeric longitude"))?;
    let lat = pair[1]
        .as_f64()
        .ok_or_else(|| geometry_error(path, "non-numeric latitude"))?;
    Ok((lng, lat))
}

fn geometry_error(path: &Path, detail: &str) -> VectorError {
    VectorError::Geometry {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Process-wide cache of point indexes, one per vector file
///
/// Station-assignment verbs hit the same file once per site; the index
/// is built on first use and shared read-only afterwards.
#[derive(Debug, Default)]
pub struct VectorIndexCache {
    inner: DashMap<PathBuf, Arc<PointIndex>>,
}

impl VectorIndexCache {
    /// Create an empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index for a file, loading it on first request
    ///
    /// # Errors
    /// Returns `VectorError` if the file needs loading and fails to.
    pub fn get(&self, path: &Path) -> Result<Arc<PointIndex>, VectorError> {
        if let Some(index) = self.inner.get(path) {
            return Ok(Arc::clone(&index));
        }
        let index = Arc::new(PointIndex::load(path)?);
        debug!(path = %path.display(), points = index.len(), "indexed vector layer");
        self.inner.insert(path.to_path_buf(), Arc::clone(&index));
        Ok(index)
    }

    /// Number of cached files
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether anything has been cached
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
