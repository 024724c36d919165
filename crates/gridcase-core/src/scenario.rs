//! Scenario definitions
//!
//! A scenario is one merged run: the configuration's `default_setup`
//! overlaid with one entry of `runs`, plus a work directory of its own.
//! Fields keep their declaration order; that order is the dependency
//! order the resolution engine walks.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value;

use crate::{value_str, FieldMap};

/// The scenario field naming the site source
pub const SITES_FIELD: &str = "sites";

/// Default name of the area/weight layer
const DEFAULT_AREA_LAYER: &str = "harvestArea";

/// One merged run definition, read-only during execution
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    name: String,
    work_dir: PathBuf,
    fields: FieldMap,
}

impl Scenario {
    /// Create a scenario from merged fields
    #[inline]
    pub fn new(name: impl Into<String>, work_dir: impl Into<PathBuf>, fields: FieldMap) -> Self {
        Self {
            name: name.into(),
            work_dir: work_dir.into(),
            fields,
        }
    }

    /// Run name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This run's working directory
    #[inline]
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// All fields in declaration order
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// One field by name
    #[inline]
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// One field as a string
    #[inline]
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(value_str)
    }

    /// The site source: an explicit coordinate list or a vector reference
    #[inline]
    #[must_use]
    pub fn sites(&self) -> Option<&Value> {
        self.field(SITES_FIELD)
    }

    /// Case template name
    #[inline]
    #[must_use]
    pub fn template(&self) -> Option<&str> {
        self.str_field("template")
    }

    /// First simulated year, consumed by the date verbs
    #[inline]
    #[must_use]
    pub fn start_year(&self) -> Option<i32> {
        self.field("startYear").and_then(Value::as_i64).map(|y| y as i32)
    }

    /// Name of the area/weight layer
    ///
    /// A site whose sampled value in this layer is exactly zero is
    /// excluded: a zero-area cell contributes nothing to the run.
    #[must_use]
    pub fn area_layer(&self) -> &str {
        self.str_field("areaLayer").unwrap_or(DEFAULT_AREA_LAYER)
    }

    /// Optional cap on the number of sampled sites
    #[inline]
    #[must_use]
    pub fn sample_cap(&self) -> Option<usize> {
        self.field("sample")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
    }

    /// Extra files to link into every case directory
    #[must_use]
    pub fn include_files(&self) -> Vec<String> {
        self.field("include")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(value_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Raster layers required by this scenario
    ///
    /// Every field whose expression carries a `raster::<path>` source
    /// contributes one layer, keyed by the field name.
    #[must_use]
    pub fn raster_layers(&self) -> IndexMap<String, String> {
        self.fields
            .iter()
            .filter_map(|(key, value)| {
                let raw = value_str(value)?;
                extract_raster(raw).map(|path| (key.clone(), path.to_string()))
            })
            .collect()
    }
}

/// Pull the raster path out of an expression string
///
/// The path is the argument following the literal `raster` token, in any
/// position: `raster::soil.asc` and `lookup::raster::soil.asc::7` both
/// name `soil.asc`.
#[must_use]
pub fn extract_raster(expression: &str) -> Option<&str> {
    if !expression.contains("raster::") {
        return None;
    }
    let mut args = expression.split("::");
    args.find(|a| *a == "raster")?;
    args.next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scenario(fields: &[(&str, Value)]) -> Scenario {
        let map: FieldMap = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Scenario::new("test", "/tmp/work", map)
    }

    #[test]
    fn extract_raster_finds_path_anywhere() {
        assert_eq!(extract_raster("raster::soil.asc"), Some("soil.asc"));
        assert_eq!(
            extract_raster("assign_by_raster_value::raster::lut.asc::1::IB0001"),
            Some("lut.asc")
        );
        assert_eq!(extract_raster("date_offset::$pdate::-30"), None);
        assert_eq!(extract_raster("plain value"), None);
    }

    #[test]
    fn raster_layers_keyed_by_field() {
        let s = scenario(&[
            ("soilClass", json!("raster::soil.asc")),
            ("harvestArea", json!("raster::area.asc")),
            ("pdate", json!("date_offset::$hdate::-120")),
            ("literal", json!(42)),
        ]);

        let layers = s.raster_layers();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers["soilClass"], "soil.asc");
        assert_eq!(layers["harvestArea"], "area.asc");
    }

    #[test]
    fn area_layer_defaults_and_overrides() {
        let default = scenario(&[]);
        assert_eq!(default.area_layer(), "harvestArea");

        let custom = scenario(&[("areaLayer", json!("cropMask"))]);
        assert_eq!(custom.area_layer(), "cropMask");
    }

    #[test]
    fn well_known_accessors() {
        let s = scenario(&[
            ("template", json!("MAIZE.CSX")),
            ("startYear", json!(1984)),
            ("sample", json!(10)),
            ("include", json!(["CULTIVAR.CUL", "ECOTYPE.ECO"])),
        ]);

        assert_eq!(s.template(), Some("MAIZE.CSX"));
        assert_eq!(s.start_year(), Some(1984));
        assert_eq!(s.sample_cap(), Some(10));
        assert_eq!(s.include_files(), vec!["CULTIVAR.CUL", "ECOTYPE.ECO"]);
    }
}
