//! Soil profile files and initial-condition layer math
//!
//! Soil data arrives in fixed-layout `.SOL` files: a `*PROFILE ...`
//! header line opens a profile section, `@`-prefixed lines carry column
//! headers, and the rows beneath them the per-layer values. Only the
//! layer tables (header starting with `SLB`) matter here; everything
//! else in the section is passed over.
//!
//! The initial-condition computation distributes the configured total
//! nitrogen across layers by a depth-weighted factor and derives the
//! starting water content from the layer's wilting point and drained
//! upper limit.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One computed initial-condition layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcLayer {
    /// Layer bottom depth (cm)
    pub icbl: f64,
    /// Initial water content (cm³/cm³)
    pub sh2o: f64,
    /// Initial ammonium (g[N]/Mg[soil])
    pub snh4: f64,
    /// Initial nitrate (g[N]/Mg[soil])
    pub sno3: f64,
}

/// Find the soil file containing a profile
///
/// Scans each candidate for a line starting `*<profile>`; the first hit
/// wins. Returns `None` when no candidate holds the profile.
#[must_use]
pub fn find_soil_profile<'a>(profile: &str, soil_files: &'a [String]) -> Option<&'a str> {
    let needle = format!("*{profile}");
    soil_files.iter().map(String::as_str).find(|path| {
        File::open(path).is_ok_and(|file| {
            BufReader::new(file)
                .lines()
                .map_while(Result::ok)
                .any(|line| line.starts_with(&needle))
        })
    })
}

/// Read the layer tables of one profile out of a soil file
///
/// Returns column name → per-layer values, as written in the file.
///
/// # Errors
/// Returns `io::Error` if the file cannot be read. A missing profile
/// yields an empty map.
pub fn read_soil_layers(
    profile: &str,
    soil_file: &Path,
) -> Result<HashMap<String, Vec<String>>, std::io::Error> {
    let needle = format!("*{profile}");
    let mut section = Vec::new();
    let mut found = false;
    for line in BufReader::new(File::open(soil_file)?).lines() {
        let line = line?.trim().to_string();
        if line.starts_with(&needle) {
            found = true;
        }
        if found && line.is_empty() {
            break;
        }
        if found {
            section.push(line);
        }
    }

    let mut data = HashMap::new();
    let mut header: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut in_layers = false;
    for line in &section {
        if let Some(titles) = line.strip_prefix('@') {
            if in_layers {
                collect_columns(&mut data, &header, &rows);
                rows.clear();
            }
            header = titles.split_whitespace().map(str::to_string).collect();
            in_layers = header.first().is_some_and(|h| h == "SLB");
        } else if in_layers {
            rows.push(line.split_whitespace().map(str::to_string).collect());
        }
    }
    if in_layers {
        collect_columns(&mut data, &header, &rows);
    }
    Ok(data)
}

fn collect_columns(
    data: &mut HashMap<String, Vec<String>>,
    header: &[String],
    rows: &[Vec<String>],
) {
    for (index, name) in header.iter().enumerate() {
        let column: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get(index).cloned())
            .collect();
        if column.len() == rows.len() {
            data.insert(name.clone(), column);
        }
    }
}

/// Compute initial-condition layers for one profile
///
/// Needs the `SLB`, `SBDM`, `SLLL`, and `SDUL` columns; `initial_n` is
/// the total nitrogen to distribute (kg/ha), `fractional_aw` the
/// fraction of plant-available water to start with.
#[must_use]
pub fn calculate_ic_layer_data(
    soil: &HashMap<String, Vec<String>>,
    initial_n: f64,
    fractional_aw: f64,
) -> Option<Vec<IcLayer>> {
    let slb = numeric_column(soil, "SLB")?;
    let sbdm = numeric_column(soil, "SBDM")?;
    let slll = numeric_column(soil, "SLLL")?;
    let sdul = numeric_column(soil, "SDUL")?;
    let n = slb.len();
    if n == 0 || sbdm.len() != n || slll.len() != n || sdul.len() != n {
        return None;
    }

    let thickness = layer_thickness(&slb);
    let midpoint = layer_midpoint(&slb);
    let top = top_fraction(&slb, &thickness);
    let bottom = bottom_fraction(&slb, &thickness);
    let middle: Vec<f64> = (0..n).map(|i| 1.0 - bottom[i] - top[i]).collect();
    let depth: Vec<f64> = (0..n)
        .map(|i| (top[i] + middle[i] * (1.0 - (midpoint[i] - 40.0) / 60.0)).max(0.05))
        .collect();
    let weight: Vec<f64> = (0..n).map(|i| sbdm[i] * thickness[i] * depth[i]).collect();
    let total_weight: f64 = weight.iter().sum();
    if total_weight == 0.0 {
        return None;
    }
    let n_total: Vec<f64> = weight.iter().map(|w| w * initial_n / total_weight).collect();
    let n_dist: Vec<f64> = (0..n)
        .map(|i| n_total[i] / sbdm[i] / thickness[i])
        .collect();

    Some(
        (0..n)
            .map(|i| IcLayer {
                icbl: slb[i],
                sh2o: fractional_aw * (sdul[i] - slll[i]) + slll[i],
                snh4: n_dist[i] * 10.0 * 0.1,
                sno3: n_dist[i] * 10.0 * 0.9,
            })
            .collect(),
    )
}

fn numeric_column(soil: &HashMap<String, Vec<String>>, name: &str) -> Option<Vec<f64>> {
    soil.get(name)?
        .iter()
        .map(|v| v.parse().ok())
        .collect()
}

fn layer_thickness(slb: &[f64]) -> Vec<f64> {
    slb.iter()
        .enumerate()
        .map(|(i, &v)| if i == 0 { v } else { v - slb[i - 1] })
        .collect()
}

/// Midpoint of the 40–100 cm band each layer occupies, 0 outside it
fn layer_midpoint(slb: &[f64]) -> Vec<f64> {
    slb.iter()
        .enumerate()
        .map(|(i, &v)| {
            if v < 40.0 || i == 0 || slb[i - 1] > 100.0 {
                0.0
            } else {
                (v.min(100.0) + slb[i - 1].max(40.0)) / 2.0
            }
        })
        .collect()
}

fn top_fraction(slb: &[f64], thickness: &[f64]) -> Vec<f64> {
    slb.iter()
        .enumerate()
        .map(|(i, &v)| {
            let c = if v < 40.0 {
                1.0
            } else {
                1.0 - ((v - 40.0) / thickness[i])
            };
            c.max(0.0)
        })
        .collect()
}

fn bottom_fraction(slb: &[f64], thickness: &[f64]) -> Vec<f64> {
    slb.iter()
        .enumerate()
        .map(|(i, &v)| {
            if i == 0 {
                0.0
            } else if slb[i - 1] > 100.0 {
                1.0
            } else {
                ((v - 100.0) / thickness[i]).max(0.0)
            }
        })
        .collect()
}
