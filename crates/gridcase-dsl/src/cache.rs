//! Shared lookup caches
//!
//! Both caches are built once and shared read-only across workers:
//! - the soil profile map (raster code → profile id) is loaded from
//!   `profile_map.json` under the configured soil root
//! - vector point indexes are built per file on first use
//!
//! Build the soil map eagerly with [`Caches::ensure_ready`] before the
//! worker pool starts; initialization is a precondition of pool
//! startup, not something workers race on.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use once_cell::sync::OnceCell;
use tracing::info;

use gridcase_core::Config;
use gridcase_gis::VectorIndexCache;

use crate::error::FunctionError;

/// Filename of the soil profile map inside the soil root
pub const PROFILE_MAP_FILE: &str = "profile_map.json";

/// Shared read-only caches for verb implementations
#[derive(Debug, Default)]
pub struct Caches {
    soil_profiles: OnceCell<HashMap<i64, String>>,
    vectors: VectorIndexCache,
}

impl Caches {
    /// Create empty caches
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The per-file vector index cache
    #[inline]
    #[must_use]
    pub fn vectors(&self) -> &VectorIndexCache {
        &self.vectors
    }

    /// Build everything that can be built before workers start
    ///
    /// # Errors
    /// Returns `FunctionError::Soil` if a soil root is configured but
    /// its profile map cannot be loaded.
    pub fn ensure_ready(&self, config: &Config) -> Result<(), FunctionError> {
        if config.soil_db.is_some() {
            let profiles = self.soil_profiles(config)?;
            info!(profiles = profiles.len(), "soil profile map ready");
        }
        Ok(())
    }

    /// The soil profile map, loading it on first call
    ///
    /// # Errors
    /// Returns `FunctionError::Soil` when no soil root is configured or
    /// the map file is missing or malformed.
    pub fn soil_profiles(&self, config: &Config) -> Result<&HashMap<i64, String>, FunctionError> {
        let root = config
            .soil_db
            .as_deref()
            .ok_or_else(|| FunctionError::Soil("soilDb is not configured".to_string()))?;
        self.soil_profiles.get_or_try_init(|| load_profile_map(root))
    }
}

fn load_profile_map(root: &Path) -> Result<HashMap<i64, String>, FunctionError> {
    let path = root.join(PROFILE_MAP_FILE);
    let text = fs::read_to_string(&path)
        .map_err(|e| FunctionError::Soil(format!("cannot read {}: {e}", path.display())))?;
    let raw: HashMap<String, String> = serde_json::from_str(&text)
        .map_err(|e| FunctionError::Soil(format!("invalid {}: {e}", path.display())))?;

    let mut map = HashMap::with_capacity(raw.len());
    for (id, profile) in raw {
        if profile.trim().is_empty() {
            continue;
        }
        let id: i64 = id
            .parse()
            .map_err(|_| FunctionError::Soil(format!("non-numeric profile id {id:?}")))?;
        map.insert(id, profile);
    }
    Ok(map)
}
