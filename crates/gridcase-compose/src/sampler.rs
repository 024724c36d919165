//! The site sampler
//!
//! Joins a scenario's site source against its raster layers. A site
//! survives only if every required layer yields real data at its
//! coordinate; the area/weight layer additionally drops sites whose
//! sampled value is exactly zero (a zero-area cell contributes nothing
//! to the run — a modelling convention, not an error).

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use gridcase_core::{Scenario, SiteRecord};
use gridcase_dsl::{Caches, Expression};
use gridcase_gis::AsciiGrid;

use crate::error::SampleError;

/// Sample every site of a scenario
///
/// Result ordering follows the site source; an optional `sample` field
/// caps the list to the first N surviving records. Dropped sites are
/// counted in the log, never fatal.
///
/// # Errors
/// Returns `SampleError` when the site source is unusable or a layer
/// fails to open. Per-site data gaps are exclusions, not errors.
pub fn sample_sites(scenario: &Scenario, caches: &Caches) -> Result<Vec<SiteRecord>, SampleError> {
    let coords = site_coordinates(scenario, caches)?;

    let mut layers = Vec::new();
    for (name, path) in scenario.raster_layers() {
        let grid = AsciiGrid::open(Path::new(&path))?;
        layers.push((name, grid));
    }

    let area_layer = scenario.area_layer();
    let total = coords.len();
    let mut records = Vec::new();
    'sites: for (lng, lat) in coords {
        let mut record = SiteRecord::new(lat, lng);
        for (name, grid) in &layers {
            let Some(value) = grid.sample(lng, lat) else {
                debug!(lat, lng, layer = %name, "dropping site: no data");
                continue 'sites;
            };
            if name == area_layer && value == 0.0 {
                debug!(lat, lng, "dropping site: zero area");
                continue 'sites;
            }
            record.layers.insert(name.clone(), sample_value(value));
        }
        records.push(record);
        if scenario.sample_cap().is_some_and(|cap| records.len() >= cap) {
            break;
        }
    }

    info!(
        run = scenario.name(),
        kept = records.len(),
        total,
        "sampled sites"
    );
    Ok(records)
}

/// Keep integral samples integral so codes stay codes
fn sample_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

/// Decode the site source into (lng, lat) pairs
///
/// An explicit list holds `[lat, lng]` pairs (the human-facing order);
/// a `vector::<path>` source reads point coordinates, which GeoJSON
/// already stores as (lng, lat).
fn site_coordinates(
    scenario: &Scenario,
    caches: &Caches,
) -> Result<Vec<(f64, f64)>, SampleError> {
    let missing = || SampleError::MissingSites {
        run: scenario.name().to_string(),
    };
    let source = scenario.sites().ok_or_else(missing)?;

    match source {
        Value::Array(entries) => entries
            .iter()
            .map(|entry| {
                let pair = entry.as_array().filter(|p| p.len() >= 2).ok_or_else(missing)?;
                let lat = pair[0].as_f64().ok_or_else(missing)?;
                let lng = pair[1].as_f64().ok_or_else(missing)?;
                Ok((lng, lat))
            })
            .collect(),
        Value::String(raw) => {
            let expr = Expression::parse(raw).filter(|e| e.verb() == "vector").ok_or_else(missing)?;
            let path = expr.arg(0).ok_or_else(missing)?;
            let index = caches.vectors().get(Path::new(path))?;
            Ok(index.points().to_vec())
        }
        _ => Err(missing()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcase_core::FieldMap;
    use serde_json::json;
    use std::io::Write;
    use std::path::PathBuf;

    /// 2×2 grid covering (10..12, 5..7); cell (11.5, 5.5) holds nodata
    fn write_soil(dir: &Path) -> PathBuf {
        let path = dir.join("soil.asc");
        std::fs::write(
            &path,
            "ncols 2\nnrows 2\nxllcorner 10\nyllcorner 5\ncellsize 1\nnodata_value -9999\n\
             3 4\n1 -9999\n",
        )
        .unwrap();
        path
    }

    /// Same grid shape; cell (10.5, 6.5) holds a zero area
    fn write_area(dir: &Path) -> PathBuf {
        let path = dir.join("area.asc");
        std::fs::write(
            &path,
            "ncols 2\nnrows 2\nxllcorner 10\nyllcorner 5\ncellsize 1\n\
             0 2.5\n7 8\n",
        )
        .unwrap();
        path
    }

    fn scenario(dir: &Path, fields: &[(&str, serde_json::Value)]) -> Scenario {
        let soil = write_soil(dir);
        let area = write_area(dir);
        let mut map: FieldMap = [
            (
                "soilClass".to_string(),
                json!(format!("raster::{}", soil.display())),
            ),
            (
                "harvestArea".to_string(),
                json!(format!("raster::{}", area.display())),
            ),
        ]
        .into_iter()
        .collect();
        for (k, v) in fields {
            map.insert(k.to_string(), v.clone());
        }
        Scenario::new("test", dir.join("work"), map)
    }

    #[test]
    fn drops_sites_missing_any_layer() {
        let dir = tempfile::tempdir().unwrap();
        let s = scenario(
            dir.path(),
            &[(
                "sites",
                // [lat, lng]: one good, one on the nodata soil cell,
                // one outside the extent
                json!([[5.5, 10.5], [5.5, 11.5], [20.0, 20.0]]),
            )],
        );

        let records = sample_sites(&s, &Caches::new()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].lat, 5.5);
        assert_eq!(records[0].lng, 10.5);
        assert_eq!(records[0].layers["soilClass"], json!(1));
        assert_eq!(records[0].layers["harvestArea"], json!(7));
    }

    #[test]
    fn zero_area_excludes_even_valid_sites() {
        let dir = tempfile::tempdir().unwrap();
        let s = scenario(
            dir.path(),
            // soil=3 there, but area=0
            &[("sites", json!([[6.5, 10.5]]))],
        );

        let records = sample_sites(&s, &Caches::new()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn sample_cap_truncates_deterministically() {
        let dir = tempfile::tempdir().unwrap();
        let s = scenario(
            dir.path(),
            &[
                ("sites", json!([[5.5, 10.5], [6.5, 11.5], [5.5, 10.5]])),
                ("sample", json!(2)),
            ],
        );

        let records = sample_sites(&s, &Caches::new()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!((records[0].lat, records[0].lng), (5.5, 10.5));
        assert_eq!((records[1].lat, records[1].lng), (6.5, 11.5));
    }

    #[test]
    fn vector_site_source() {
        let dir = tempfile::tempdir().unwrap();
        let sites = dir.path().join("sites.json");
        let mut f = std::fs::File::create(&sites).unwrap();
        write!(
            f,
            r#"{{"type": "FeatureCollection", "features": [
                {{"type": "Feature", "properties": {{}},
                  "geometry": {{"type": "Point", "coordinates": [10.5, 5.5]}}}}
            ]}}"#
        )
        .unwrap();

        let s = scenario(
            dir.path(),
            &[("sites", json!(format!("vector::{}", sites.display())))],
        );

        let records = sample_sites(&s, &Caches::new()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!((records[0].lng, records[0].lat), (10.5, 5.5));
    }

    #[test]
    fn missing_site_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = scenario(dir.path(), &[]);

        let result = sample_sites(&s, &Caches::new());
        assert!(matches!(result, Err(SampleError::MissingSites { .. })));
    }

    #[test]
    fn fractional_samples_stay_floats() {
        let dir = tempfile::tempdir().unwrap();
        let s = scenario(dir.path(), &[("sites", json!([[6.5, 11.5]]))]);

        let records = sample_sites(&s, &Caches::new()).unwrap();
        assert_eq!(records[0].layers["harvestArea"], json!(2.5));
        assert_eq!(records[0].layers["soilClass"], json!(4));
    }
}
