//! Platform-aware date and timestamp helpers.
//!
//! On native platforms "today" comes from `chrono::Local`.
//! On WASM it is read from `js_sys::Date` so it follows the browser's timezone.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Error, Result};

/// Storage format of `daily_notes.date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage format of SQLite's `CURRENT_TIMESTAMP`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Returns the current local calendar date.
pub fn today() -> NaiveDate {
    #[cfg(target_arch = "wasm32")]
    {
        let now = js_sys::Date::new_0();
        NaiveDate::from_ymd_opt(
            now.get_full_year() as i32,
            now.get_month() + 1,
            now.get_date(),
        )
        .unwrap_or(NaiveDate::MIN)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        chrono::Local::now().date_naive()
    }
}

/// Formats a date the way it is stored.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses a stored `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| Error::Corrupted(format!("bad date '{}': {}", value, e)))
}

/// Parses a stored `CURRENT_TIMESTAMP` value.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map_err(|e| Error::Corrupted(format!("bad timestamp '{}': {}", value, e)))
}
