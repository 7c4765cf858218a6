//! Shared primitive types used across the entire simulator.

use chrono::NaiveDate;

use crate::error::{SimError, SimResult};

/// One simulated calendar day. One day = one partition of output files.
pub type Day = NaiveDate;

/// A stable, unique identifier for a registered subject (`cle_bdf`).
pub type EntityKey = String;

/// Wire format for every date cell and every partition file name.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_day(day: Day) -> String {
    day.format(DATE_FORMAT).to_string()
}

pub fn parse_day(s: &str) -> SimResult<Day> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| SimError::InvalidDate {
        value: s.to_string(),
    })
}

/// Parse an optional date cell. Blank means "not applicable".
pub fn parse_optional_day(s: &str) -> SimResult<Option<Day>> {
    if s.is_empty() {
        Ok(None)
    } else {
        parse_day(s).map(Some)
    }
}

pub fn format_optional_day(day: Option<Day>) -> String {
    day.map(format_day).unwrap_or_default()
}
