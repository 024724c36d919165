//! Date encodings
//!
//! The model world speaks two encodings: ISO `YYYY-MM-DD` inside
//! contexts and configuration, and 5-digit julian `YYDDD` inside case
//! files and weather file names.

use chrono::{Datelike, NaiveDate};

/// Format a date as ISO `YYYY-MM-DD`
#[inline]
#[must_use]
pub fn to_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse an ISO `YYYY-MM-DD` date
#[inline]
#[must_use]
pub fn from_iso(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Format a date as julian `YYDDD`
#[inline]
#[must_use]
pub fn to_julian(date: NaiveDate) -> String {
    format!("{:02}{:03}", date.year() % 100, date.ordinal())
}

/// Parse a julian `YYDDD` date (two-digit years pivot at 69)
#[inline]
#[must_use]
pub fn from_julian(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%y%j").ok()
}

/// The date at a 1-based day of year
#[inline]
#[must_use]
pub fn from_year_doy(year: i32, doy: i64) -> Option<NaiveDate> {
    u32::try_from(doy)
        .ok()
        .and_then(|doy| NaiveDate::from_yo_opt(year, doy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_roundtrip() {
        let date = NaiveDate::from_ymd_opt(1984, 3, 15).unwrap();
        assert_eq!(to_iso(date), "1984-03-15");
        assert_eq!(from_iso("1984-03-15"), Some(date));
        assert_eq!(from_iso("84-03-15"), None);
    }

    #[test]
    fn julian_roundtrip() {
        let date = NaiveDate::from_ymd_opt(1984, 1, 1).unwrap();
        assert_eq!(to_julian(date), "84001");
        assert_eq!(from_julian("84001"), Some(date));

        let leap_end = NaiveDate::from_ymd_opt(2020, 12, 31).unwrap();
        assert_eq!(to_julian(leap_end), "20366");
    }

    #[test]
    fn year_doy_bounds() {
        assert_eq!(
            from_year_doy(1984, 60),
            NaiveDate::from_ymd_opt(1984, 2, 29)
        );
        // 1985 is not a leap year
        assert_eq!(from_year_doy(1985, 366), None);
        assert_eq!(from_year_doy(1985, 0), None);
        assert_eq!(from_year_doy(1985, -3), None);
    }
}
