//! Built-in verbs
//!
//! Each verb receives the field key, the parsed expression, the scenario
//! and the partially built context, and returns a partial field map to
//! merge back in. Argument conventions:
//! - `$name` references a context key
//! - `raster` marks the field's own sampled layer value as an input;
//!   the sampled number is already in the context under the field key
//! - `vector::<path>::<attribute>` names a point layer lookup

use std::path::Path;

use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::error;

use gridcase_core::FieldMap;

use crate::dates;
use crate::error::FunctionError;
use crate::expr::context_ref;
use crate::registry::FunctionInput;
use crate::soil;

/// `auto_planting_window::[raster::<layer>|<month>]::<day>::<length>`
///
/// Opens a planting window at month/day of the start year (month from
/// the sampled raster when a raster source is given) and closes it
/// `length` days later.
pub(crate) fn auto_planting_window(input: &FunctionInput<'_>) -> Result<FieldMap, FunctionError> {
    let vals = raster_substituted_ints(input)?;
    if vals.len() < 3 {
        return Err(FunctionError::invalid(input.key, "expected month, day, length"));
    }
    let year = require_start_year(input)?;
    let month = u32::try_from(vals[0])
        .ok()
        .filter(|m| (1..=12).contains(m))
        .ok_or_else(|| FunctionError::invalid(input.key, format!("invalid month {}", vals[0])))?;
    let day = u32::try_from(vals[1])
        .ok()
        .filter(|d| (1..=31).contains(d))
        .ok_or_else(|| FunctionError::invalid(input.key, format!("invalid day {}", vals[1])))?;
    let first = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| FunctionError::invalid(input.key, "window start is not a date"))?;
    planting_window(input.key, first, vals[2])
}

/// `auto_planting_window_doy::[raster::<layer>|<doy>]::<offset>::<length>`
///
/// Like [`auto_planting_window`], with the start expressed as day of
/// year plus an offset.
pub(crate) fn auto_planting_window_doy(
    input: &FunctionInput<'_>,
) -> Result<FieldMap, FunctionError> {
    let vals = raster_substituted_ints(input)?;
    if vals.len() < 3 {
        return Err(FunctionError::invalid(input.key, "expected doy, offset, length"));
    }
    let first = offset_days(jan1(require_start_year(input)?), vals[0] + vals[1] - 1)
        .ok_or_else(|| FunctionError::invalid(input.key, "window start is not a date"))?;
    planting_window(input.key, first, vals[2])
}

/// `auto_planting_window_doy_shape::vector::<path>::<attribute>::<offset>::<length>`
///
/// Day of year comes from the nearest point of a vector layer.
pub(crate) fn auto_planting_window_doy_shape(
    input: &FunctionInput<'_>,
) -> Result<FieldMap, FunctionError> {
    let pos = input
        .expr
        .vector_position()
        .ok_or_else(|| FunctionError::invalid(input.key, "vector source required"))?;
    let path = required_arg(input, pos + 1)?;
    let attribute = required_arg(input, pos + 2)?;
    let offset = int_arg(input, pos + 3)?;
    let length = int_arg(input, pos + 4)?;

    let (lng, lat) = site_coords(input)?;
    let index = input.caches.vectors().get(Path::new(path))?;
    let doy = index
        .find_attribute(lng, lat, attribute)
        .and_then(value_to_i64)
        .ok_or_else(|| {
            FunctionError::no_match(input.key, format!("no {attribute} near ({lng}, {lat})"))
        })?;

    let first = offset_days(jan1(require_start_year(input)?), doy + offset)
        .ok_or_else(|| FunctionError::invalid(input.key, "window start is not a date"))?;
    planting_window(input.key, first, length)
}

/// `lookup_hc27::[raster::<layer>|<class>]`
///
/// Formats a generic soil class code, `HC_GEN0012` style.
pub(crate) fn lookup_hc27(input: &FunctionInput<'_>) -> Result<FieldMap, FunctionError> {
    let code = if input.expr.raster_position().is_some() {
        let value = context_value(input, input.key)?;
        let class = value_to_i64(value).ok_or_else(|| {
            FunctionError::invalid(input.key, "sampled soil class is not numeric")
        })?;
        format!("HC_GEN{class:0>4}")
    } else {
        let class = required_arg(input, 0)?;
        format!("HC_GEN{class:0>4}")
    };
    Ok(single(input.key, json!(code)))
}

/// `lookup_wth::<station>::vector::<path>::<attribute>`
///
/// Assigns the nearest weather cell: the station code goes under the
/// field key and the cell's file name under `wthFile`.
pub(crate) fn lookup_wth(input: &FunctionInput<'_>) -> Result<FieldMap, FunctionError> {
    let station = required_arg(input, 0)?;
    let pos = input
        .expr
        .vector_position()
        .ok_or_else(|| FunctionError::invalid(input.key, "vector source required"))?;
    let path = required_arg(input, pos + 1)?;
    let attribute = required_arg(input, pos + 2)?;

    let (lng, lat) = site_coords(input)?;
    let index = input.caches.vectors().get(Path::new(path))?;
    let cell = index
        .find_attribute(lng, lat, attribute)
        .and_then(value_to_i64)
        .ok_or_else(|| {
            FunctionError::no_match(input.key, format!("no {attribute} near ({lng}, {lat})"))
        })?;

    let mut out = single(input.key, json!(station));
    out.insert("wthFile".to_string(), json!(format!("{cell}.WTH")));
    Ok(out)
}

/// `lookup_soil_profile::raster::<layer>`
///
/// Maps the sampled soil code through the profile map and points
/// `soilFiles` at the `.SOL` file holding the profile.
pub(crate) fn lookup_soil_profile(input: &FunctionInput<'_>) -> Result<FieldMap, FunctionError> {
    if input.expr.raster_position().is_none() {
        return Err(FunctionError::invalid(input.key, "raster source required"));
    }
    let id = value_to_i64(context_value(input, input.key)?)
        .ok_or_else(|| FunctionError::invalid(input.key, "sampled soil id is not numeric"))?;

    let profiles = input.caches.soil_profiles(input.config)?;
    let Some(profile) = profiles.get(&id) else {
        let (lng, lat) = site_coords(input).unwrap_or((f64::NAN, f64::NAN));
        error!(id, lng, lat, "invalid soil id");
        return Err(FunctionError::no_match(input.key, format!("soil id {id}")));
    };

    let root = input
        .config
        .soil_db
        .as_deref()
        .ok_or_else(|| FunctionError::Soil("soilDb is not configured".to_string()))?;
    let prefix: String = profile.chars().take(2).collect::<String>().to_uppercase();
    let sol_file = root.join(format!("{prefix}.SOL"));

    let mut out = single(input.key, json!(profile));
    out.insert(
        "soilFiles".to_string(),
        json!([sol_file.to_string_lossy()]),
    );
    Ok(out)
}

/// `generate_ic_layers::[$<profile-field>|<profile-field>]`
///
/// Computes initial-condition layers from the soil profile already
/// resolved into the context.
pub(crate) fn generate_ic_layers(input: &FunctionInput<'_>) -> Result<FieldMap, FunctionError> {
    let arg = required_arg(input, 0)?;
    let profile_key = context_ref(arg).unwrap_or(arg);
    let profile = context_value(input, profile_key)?
        .as_str()
        .ok_or_else(|| FunctionError::invalid(input.key, "profile is not a string"))?
        .to_string();

    let soil_files: Vec<String> = context_value(input, "soilFiles")?
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .ok_or_else(|| FunctionError::invalid(input.key, "soilFiles is not a list"))?;

    let soil_file = soil::find_soil_profile(&profile, &soil_files)
        .ok_or_else(|| FunctionError::no_match(input.key, format!("profile {profile}")))?
        .to_string();
    let layers = soil::read_soil_layers(&profile, Path::new(&soil_file))?;

    let initial_n = scenario_f64(input, "initialN")?;
    let fractional_aw = scenario_f64(input, "fractionalAW")?;
    let ic = soil::calculate_ic_layer_data(&layers, initial_n, fractional_aw)
        .ok_or_else(|| FunctionError::no_match(input.key, "incomplete soil layer data"))?;

    let rows: Vec<Value> = ic
        .iter()
        .map(|l| {
            json!({
                "icbl": l.icbl,
                "sh2o": l.sh2o,
                "snh4": l.snh4,
                "sno3": l.sno3,
            })
        })
        .collect();
    Ok(single(input.key, Value::Array(rows)))
}

/// `split_fert_dap_percent::[$<total-field>|<total>]::<splits>::<dap>::<pct>::...`
///
/// Splits a fertiliser total into (days-after-planting, amount) pairs.
/// Percentages must be non-negative, distinct in day, and sum to 100.
pub(crate) fn split_fert_dap_percent(input: &FunctionInput<'_>) -> Result<FieldMap, FunctionError> {
    let first = required_arg(input, 0)?;
    let total = match context_ref(first) {
        Some(key) => value_to_f64(context_value(input, key)?)
            .ok_or_else(|| FunctionError::invalid(input.key, "referenced total is not numeric"))?,
        None => first
            .parse()
            .map_err(|_| FunctionError::invalid(input.key, "total is not numeric"))?,
    };

    let splits = input.expr.args().get(2..).unwrap_or_default();
    if splits.iter().any(|s| s.starts_with('-')) {
        return Err(FunctionError::invalid(input.key, "no argument may be negative"));
    }
    let daps: Vec<i64> = splits
        .iter()
        .step_by(2)
        .map(|s| s.parse())
        .collect::<Result<_, _>>()
        .map_err(|_| FunctionError::invalid(input.key, "days must be integers"))?;
    let percents: Vec<f64> = splits
        .iter()
        .skip(1)
        .step_by(2)
        .map(|s| s.parse::<f64>().map(|p| p / 100.0))
        .collect::<Result<_, _>>()
        .map_err(|_| FunctionError::invalid(input.key, "percents must be numeric"))?;

    if daps.len() != percents.len() || daps.is_empty() {
        return Err(FunctionError::invalid(input.key, "days and percents must pair up"));
    }
    let sum: f64 = percents.iter().sum();
    if (sum - 1.0).abs() > 1e-9 {
        return Err(FunctionError::invalid(input.key, "percents must sum to 100"));
    }
    let mut seen = std::collections::HashSet::new();
    if !daps.iter().all(|d| seen.insert(*d)) {
        return Err(FunctionError::invalid(input.key, "days must be distinct"));
    }

    let applications: Vec<Value> = daps
        .iter()
        .zip(&percents)
        .map(|(dap, pct)| json!({"fdap": dap, "famn": total * pct}))
        .collect();
    Ok(single(input.key, Value::Array(applications)))
}

/// `assign_by_raster_value::raster::<layer>::<value>::<assignment>::...`
///
/// Translates the sampled raster value through an explicit value→string
/// table. A sampled value with no assignment fails the site.
pub(crate) fn assign_by_raster_value(input: &FunctionInput<'_>) -> Result<FieldMap, FunctionError> {
    let pos = input
        .expr
        .raster_position()
        .ok_or_else(|| FunctionError::invalid(input.key, "raster source required"))?;
    let pairs = input.expr.args().get(pos + 2..).unwrap_or_default();

    let values: Vec<i64> = pairs
        .iter()
        .step_by(2)
        .map(|s| s.parse())
        .collect::<Result<_, _>>()
        .map_err(|_| FunctionError::invalid(input.key, "raster values must be integers"))?;
    let assignments: Vec<&String> = pairs.iter().skip(1).step_by(2).collect();
    if values.len() != assignments.len() || values.is_empty() {
        return Err(FunctionError::invalid(
            input.key,
            "values and assignments don't pair up",
        ));
    }

    let sampled = value_to_i64(context_value(input, input.key)?)
        .ok_or_else(|| FunctionError::invalid(input.key, "sampled value is not numeric"))?;
    let index = values.iter().position(|v| *v == sampled).ok_or_else(|| {
        FunctionError::no_match(input.key, format!("no assignment for value {sampled}"))
    })?;
    Ok(single(input.key, json!(assignments[index])))
}

/// `date_from_doy_raster::raster::<layer>`
///
/// Converts a sampled day of year into an ISO date in the start year.
pub(crate) fn date_from_doy_raster(input: &FunctionInput<'_>) -> Result<FieldMap, FunctionError> {
    if input.expr.raster_position().is_none() {
        return Err(FunctionError::invalid(input.key, "raster source required"));
    }
    let doy = value_to_i64(context_value(input, input.key)?)
        .ok_or_else(|| FunctionError::invalid(input.key, "sampled value is not numeric"))?;
    if !(1..=366).contains(&doy) {
        return Err(FunctionError::invalid(
            input.key,
            format!("invalid day of year {doy}"),
        ));
    }
    let date = dates::from_year_doy(require_start_year(input)?, doy)
        .ok_or_else(|| FunctionError::invalid(input.key, format!("day {doy} not in start year")))?;
    Ok(single(input.key, json!(dates::to_iso(date))))
}

/// `date_offset::$<date-field>::<days>`
///
/// Shifts a context date by a day count. Only referenced variables make
/// sense here; a literal first argument is an error.
pub(crate) fn date_offset(input: &FunctionInput<'_>) -> Result<FieldMap, FunctionError> {
    let offset: i64 = input
        .expr
        .args()
        .last()
        .ok_or_else(|| FunctionError::invalid(input.key, "missing offset"))?
        .parse()
        .map_err(|_| FunctionError::invalid(input.key, "offset is not an integer"))?;

    let first = required_arg(input, 0)?;
    let key = context_ref(first).ok_or_else(|| {
        FunctionError::invalid(input.key, "date_offset only works with referenced variables")
    })?;
    let date = context_value(input, key)?
        .as_str()
        .and_then(dates::from_iso)
        .ok_or_else(|| FunctionError::invalid(input.key, format!("{key:?} is not an ISO date")))?;
    let shifted = offset_days(date, offset)
        .ok_or_else(|| FunctionError::invalid(input.key, "offset leaves the calendar"))?;
    Ok(single(input.key, json!(dates::to_iso(shifted))))
}

// ---- shared helpers ----

fn single(key: &str, value: Value) -> FieldMap {
    let mut out = FieldMap::new();
    out.insert(key.to_string(), value);
    out
}

fn context_value<'a>(input: &FunctionInput<'a>, key: &str) -> Result<&'a Value, FunctionError> {
    input
        .context
        .get(key)
        .ok_or_else(|| FunctionError::MissingContextKey {
            field: input.key.to_string(),
            key: key.to_string(),
        })
}

fn required_arg<'a>(input: &FunctionInput<'a>, index: usize) -> Result<&'a str, FunctionError> {
    input
        .expr
        .arg(index)
        .ok_or_else(|| FunctionError::invalid(input.key, format!("missing argument {index}")))
}

fn int_arg(input: &FunctionInput<'_>, index: usize) -> Result<i64, FunctionError> {
    required_arg(input, index)?.parse().map_err(|_| {
        FunctionError::invalid(input.key, format!("argument {index} is not an integer"))
    })
}

fn require_start_year(input: &FunctionInput<'_>) -> Result<i32, FunctionError> {
    input
        .scenario
        .start_year()
        .ok_or_else(|| FunctionError::invalid(input.key, "scenario has no startYear"))
}

fn scenario_f64(input: &FunctionInput<'_>, field: &str) -> Result<f64, FunctionError> {
    input
        .scenario
        .field(field)
        .and_then(value_to_f64)
        .ok_or_else(|| FunctionError::invalid(input.key, format!("scenario has no {field}")))
}

fn site_coords(input: &FunctionInput<'_>) -> Result<(f64, f64), FunctionError> {
    let lng = value_to_f64(context_value(input, "lng")?)
        .ok_or_else(|| FunctionError::invalid(input.key, "lng is not numeric"))?;
    let lat = value_to_f64(context_value(input, "lat")?)
        .ok_or_else(|| FunctionError::invalid(input.key, "lat is not numeric"))?;
    Ok((lng, lat))
}

/// Replace the layer reference with the field's sampled value and parse
/// everything as integers
///
/// With `lookup::raster::<layer>::a::b`, the sampled number stands in
/// for `raster::<layer>` and the result is `[sampled, a, b]`.
fn raster_substituted_ints(input: &FunctionInput<'_>) -> Result<Vec<i64>, FunctionError> {
    let mut args: Vec<String> = input.expr.args().to_vec();
    if let Some(pos) = input.expr.raster_position() {
        if pos + 1 >= args.len() {
            return Err(FunctionError::invalid(input.key, "raster source without layer"));
        }
        let sampled = value_to_i64(context_value(input, input.key)?).ok_or_else(|| {
            FunctionError::invalid(input.key, "sampled layer value is not numeric")
        })?;
        args[pos + 1] = sampled.to_string();
        args.remove(pos);
    }
    args.iter()
        .map(|a| a.parse())
        .collect::<Result<_, _>>()
        .map_err(|_| FunctionError::invalid(input.key, "arguments must be integers"))
}

fn planting_window(key: &str, first: NaiveDate, length: i64) -> Result<FieldMap, FunctionError> {
    let last = offset_days(first, length)
        .ok_or_else(|| FunctionError::invalid(key, "window end leaves the calendar"))?;
    let mut out = FieldMap::new();
    out.insert("pdate".to_string(), json!(dates::to_iso(first)));
    out.insert("pfrst".to_string(), json!(dates::to_iso(first)));
    out.insert("plast".to_string(), json!(dates::to_iso(last)));
    Ok(out)
}

fn jan1(year: i32) -> NaiveDate {
    // Jan 1 exists for every chrono-representable year
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or_default()
}

fn offset_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(chrono::Duration::try_days(days)?)
}

/// Lenient numeric read: numbers, floats, and numeric strings all count
fn value_to_i64(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    if let Some(f) = value.as_f64() {
        return Some(f as i64);
    }
    let s = value.as_str()?.trim();
    s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
}

fn value_to_f64(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}
