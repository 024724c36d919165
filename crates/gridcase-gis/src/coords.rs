//! Coordinate helpers
//!
//! The case tree is laid out by coordinate: every site gets a
//! `<lat-segment>/<lng-segment>` directory pair like `7_123N/3_050E`.
//! Segments are fixed to three decimals with the point replaced by an
//! underscore, so paths are stable, sortable, and collision-free at the
//! grid resolutions in use.

/// Relative "distance" between two lat/lng points
///
/// Squared Euclidean in coordinate space. Only meaningful for comparing
/// proximity between candidates; the output is not in any distance unit
/// and must not be treated as one.
#[inline]
#[must_use]
pub fn sq_dist(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    if lat1 == lat2 && lon1 == lon2 {
        return 0.0;
    }
    (lat1 - lat2).powi(2) + (lon1 - lon2).powi(2)
}

/// Latitude path segment, e.g. `7.1234 → "7_123N"`, `-0.5 → "0_500S"`
#[must_use]
pub fn lat_segment(lat: f64) -> String {
    let hemisphere = if lat >= 0.0 { 'N' } else { 'S' };
    encode_segment(lat, hemisphere)
}

/// Longitude path segment, e.g. `-3.05 → "3_050W"`
#[must_use]
pub fn lng_segment(lng: f64) -> String {
    let hemisphere = if lng >= 0.0 { 'E' } else { 'W' };
    encode_segment(lng, hemisphere)
}

/// Both path segments for a site, latitude first
#[must_use]
pub fn news_path(lat: f64, lng: f64) -> (String, String) {
    (lat_segment(lat), lng_segment(lng))
}

fn encode_segment(value: f64, hemisphere: char) -> String {
    format!("{:.3}{}", value.abs(), hemisphere).replace('.', "_")
}

/// Decode a path segment back into a signed coordinate
///
/// Returns `None` for strings that are not segments this module
/// produced. The magnitude is exact to the encoded three decimals.
#[must_use]
pub fn decode_segment(segment: &str) -> Option<f64> {
    let hemisphere = segment.chars().last()?;
    let body = &segment[..segment.len() - hemisphere.len_utf8()];
    let sign = match hemisphere {
        'N' | 'E' => 1.0,
        'S' | 'W' => -1.0,
        _ => return None,
    };
    let magnitude: f64 = body.replace('_', ".").parse().ok()?;
    if magnitude < 0.0 {
        return None;
    }
    Some(sign * magnitude)
}
