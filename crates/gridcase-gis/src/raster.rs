//! ASCII grid rasters
//!
//! Layers arrive as ESRI ASCII grids: a short `key value` header
//! (`ncols`, `nrows`, `xllcorner`, `yllcorner`, `cellsize`, optional
//! `nodata_value`) followed by row-major cell values, northmost row
//! first. The whole band is read into memory once per layer and then
//! sampled per site, so repeated sampling never re-reads the file.

use std::fs;
use std::path::Path;

use crate::error::RasterError;

/// Header of an ASCII grid
///
/// Carried separately from the cell data so configuration validation can
/// compare resolution and alignment across layers without loading bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridProfile {
    /// Number of columns
    pub ncols: usize,
    /// Number of rows
    pub nrows: usize,
    /// X coordinate of the lower-left corner
    pub xllcorner: f64,
    /// Y coordinate of the lower-left corner
    pub yllcorner: f64,
    /// Cell edge length in coordinate units
    pub cellsize: f64,
    /// Sentinel marking cells without data
    pub nodata: f64,
}

impl GridProfile {
    /// Whether two layers can be sampled against the same site set
    ///
    /// Layers must share the cell size and be grid-aligned; differing
    /// extents are fine (a site outside one layer's extent simply drops).
    #[must_use]
    pub fn compatible_with(&self, other: &GridProfile) -> bool {
        if self.cellsize != other.cellsize {
            return false;
        }
        let dx = (self.xllcorner - other.xllcorner) / self.cellsize;
        let dy = (self.yllcorner - other.yllcorner) / self.cellsize;
        dx.fract().abs() < 1e-6 && dy.fract().abs() < 1e-6
    }
}

/// An ASCII grid raster loaded into memory
#[derive(Debug, Clone)]
pub struct AsciiGrid {
    profile: GridProfile,
    data: Vec<f64>,
}

impl AsciiGrid {
    /// Load a raster, header and band
    ///
    /// # Errors
    /// Returns `RasterError` if the file is unreadable, the header is
    /// malformed, or the cell payload does not match the declared
    /// dimensions.
    pub fn open(path: &Path) -> Result<Self, RasterError> {
        let text = fs::read_to_string(path).map_err(|source| RasterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse(path, &text)
    }

    /// Read only the header of a raster file
    ///
    /// # Errors
    /// Returns `RasterError` if the file is unreadable or the header is
    /// malformed.
    pub fn profile_of(path: &Path) -> Result<GridProfile, RasterError> {
        let text = fs::read_to_string(path).map_err(|source| RasterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut lines = text.lines();
        let (profile, _) = parse_header(path, &mut lines)?;
        Ok(profile)
    }

    /// The raster's header
    #[inline]
    #[must_use]
    pub fn profile(&self) -> &GridProfile {
        &self.profile
    }

    /// Sample the cell containing (lng, lat)
    ///
    /// Returns `None` when the point falls outside the raster extent or
    /// the cell holds the nodata sentinel. Both cases mean the same
    /// thing to the sampler: no usable value at this site.
    #[must_use]
    pub fn sample(&self, lng: f64, lat: f64) -> Option<f64> {
        let p = &self.profile;
        let col = ((lng - p.xllcorner) / p.cellsize).floor();
        let row_from_south = ((lat - p.yllcorner) / p.cellsize).floor();
        if col < 0.0 || row_from_south < 0.0 {
            return None;
        }
        let (col, row_from_south) = (col as usize, row_from_south as usize);
        if col >= p.ncols || row_from_south >= p.nrows {
            return None;
        }
        // data is stored north-to-south
        let row = p.nrows - 1 - row_from_south;
        let value = self.data[row * p.ncols + col];
        if value == p.nodata {
            None
        } else {
            Some(value)
        }
    }
}

fn parse(path: &Path, text: &str) -> Result<AsciiGrid, RasterError> {
    let mut lines = text.lines();
    let (profile, first_body_line) = parse_header(path, &mut lines)?;
    let expected = profile.ncols * profile.nrows;
    let mut data = Vec::with_capacity(expected);
    let body_lines = first_body_line.into_iter().chain(lines);
    for line in body_lines {
        for token in line.split_whitespace() {
            let value: f64 = token.parse().map_err(|_| RasterError::CellValue {
                path: path.to_path_buf(),
                value: token.to_string(),
            })?;
            data.push(value);
        }
    }
    if data.len() != expected {
        return Err(RasterError::CellCount {
            path: path.to_path_buf(),
            expected,
            found: data.len(),
        });
    }
    Ok(AsciiGrid { profile, data })
}

/// Consume the `key value` header lines
///
/// Header lines start with an alphabetic key; the first line that does
/// not begins the cell payload and is handed back to the caller.
fn parse_header<'a>(
    path: &Path,
    lines: &mut std::str::Lines<'a>,
) -> Result<(GridProfile, Option<&'a str>), RasterError> {
    let mut ncols = None;
    let mut nrows = None;
    let mut xllcorner = None;
    let mut yllcorner = None;
    let mut cellsize = None;
    let mut nodata = -9999.0;
    let mut first_body_line = None;

    for line in lines.by_ref() {
        let trimmed = line.trim();
        let mut parts = trimmed.split_whitespace();
        let key = parts.next().unwrap_or_default().to_ascii_lowercase();
        if !key.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
            first_body_line = Some(line);
            break;
        }
        let value = parts
            .next()
            .ok_or_else(|| header_error(path, &format!("missing value for {key}")))?;
        match key.as_str() {
            "ncols" => ncols = Some(parse_field(path, &key, value)? as usize),
            "nrows" => nrows = Some(parse_field(path, &key, value)? as usize),
            "xllcorner" => xllcorner = Some(parse_field(path, &key, value)?),
            "yllcorner" => yllcorner = Some(parse_field(path, &key, value)?),
            "cellsize" => cellsize = Some(parse_field(path, &key, value)?),
            "nodata_value" => nodata = parse_field(path, &key, value)?,
            other => return Err(header_error(path, &format!("unknown key {other}"))),
        }
    }

    let profile = GridProfile {
        ncols: ncols.ok_or_else(|| header_error(path, "missing ncols"))?,
        nrows: nrows.ok_or_else(|| header_error(path, "missing nrows"))?,
        xllcorner: xllcorner.ok_or_else(|| header_error(path, "missing xllcorner"))?,
        yllcorner: yllcorner.ok_or_else(|| header_error(path, "missing yllcorner"))?,
        cellsize: cellsize.ok_or_else(|| header_error(path, "missing cellsize"))?,
        nodata,
    };
    if profile.cellsize <= 0.0 {
        return Err(header_error(path, "cellsize must be positive"));
    }
    Ok((profile, first_body_line))
}

fn parse_field(path: &Path, key: &str, value: &str) -> Result<f64, RasterError> {
    value
        .parse()
        .map_err(|_| header_error(path, &format!("invalid {key}: {value}")))
}

fn header_error(path: &Path, detail: &str) -> RasterError {
    RasterError::Header {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const GRID: &str = "ncols 3\n\
                        nrows 2\n\
                        xllcorner 10.0\n\
                        yllcorner 5.0\n\
                        cellsize 1.0\n\
                        nodata_value -9999\n\
                        1 2 3\n\
                        4 -9999 6\n";

    fn write_grid(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn sample_inside_extent() {
        let file = write_grid(GRID);
        let grid = AsciiGrid::open(file.path()).unwrap();

        // bottom-left cell is the last row of the payload
        assert_eq!(grid.sample(10.5, 5.5), Some(4.0));
        // top-right cell is the first row
        assert_eq!(grid.sample(12.5, 6.5), Some(3.0));
    }

    #[test]
    fn sample_outside_extent_is_none() {
        let file = write_grid(GRID);
        let grid = AsciiGrid::open(file.path()).unwrap();

        assert_eq!(grid.sample(9.0, 5.5), None);
        assert_eq!(grid.sample(10.5, 8.0), None);
        assert_eq!(grid.sample(-10.5, -5.5), None);
    }

    #[test]
    fn sample_nodata_is_none() {
        let file = write_grid(GRID);
        let grid = AsciiGrid::open(file.path()).unwrap();

        assert_eq!(grid.sample(11.5, 5.5), None);
    }

    #[test]
    fn header_only_read() {
        let file = write_grid(GRID);
        let profile = AsciiGrid::profile_of(file.path()).unwrap();

        assert_eq!(profile.ncols, 3);
        assert_eq!(profile.nrows, 2);
        assert_eq!(profile.cellsize, 1.0);
    }

    #[test]
    fn cell_count_mismatch_rejected() {
        let file = write_grid(
            "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n",
        );
        let result = AsciiGrid::open(file.path());
        assert!(matches!(result, Err(RasterError::CellCount { .. })));
    }

    #[test]
    fn aligned_profiles_are_compatible() {
        let a = GridProfile {
            ncols: 10,
            nrows: 10,
            xllcorner: 0.0,
            yllcorner: 0.0,
            cellsize: 0.5,
            nodata: -9999.0,
        };
        let b = GridProfile {
            xllcorner: 2.0,
            yllcorner: -1.5,
            ..a
        };
        let c = GridProfile { cellsize: 0.25, ..a };
        let d = GridProfile {
            xllcorner: 0.3,
            ..a
        };

        assert!(a.compatible_with(&b));
        assert!(!a.compatible_with(&c));
        assert!(!a.compatible_with(&d));
    }
}
