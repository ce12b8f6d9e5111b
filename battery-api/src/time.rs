//! Parsing of caller-supplied time strings into canonical UTC instants.
//!
//! The same canonical form is used for stored timestamps and for range
//! bounds, so two inputs denoting the same instant always compare equal
//! in the store.

use crate::errors::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::Serializer;

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
    "%Y%m%dT%H%M%S%.f%z",
    "%Y%m%dT%H%M%S%z",
    "%Y%m%dT%H%M%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M%S",
    "%Y%m%dT%H%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

/// Parses `input` into a UTC instant truncated to millisecond precision.
///
/// Accepts RFC 3339 / ISO 8601 date-times with `Z`, `+hh:mm`, `+hhmm` or
/// `+hh` offsets, offset-less date-times (taken as UTC), the ISO basic form
/// (`20240101T000000Z`), hour-only clocks (`2024-01-01T10`) and reduced
/// dates (`2024`, `2024-01`, `2024-01-01`), which mean their first instant.
pub fn normalize(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidTimestamp(input.to_string()));
    }

    parse(trimmed)
        .map(|instant| instant.trunc_subsecs(3))
        .ok_or_else(|| Error::InvalidTimestamp(input.to_string()))
}

/// Current instant in canonical form.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Renders an instant as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn to_canonical_string(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `serialize_with` adapter for canonical timestamp rendering.
pub fn serialize_canonical<S>(instant: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&to_canonical_string(instant))
}

fn parse(s: &str) -> Option<DateTime<Utc>> {
    let expanded = expand_reduced(s);
    let s = expanded.as_str();

    if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
        return Some(instant.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(instant) = DateTime::parse_from_str(s, format) {
            return Some(instant.with_timezone(&Utc));
        }
    }

    // A trailing `Z` on an otherwise naive value (e.g. no seconds) means UTC.
    let naive = s
        .strip_suffix('Z')
        .or_else(|| s.strip_suffix('z'))
        .unwrap_or(s);

    for format in NAIVE_FORMATS {
        if let Ok(instant) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(instant.and_utc());
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(naive, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

/// Fills in the parts ISO 8601 lets a writer leave out: month and day of a
/// reduced date, minutes of an hour-only clock and minutes of a `±hh` offset.
fn expand_reduced(s: &str) -> String {
    let is_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());

    match s.split_once('-') {
        None if s.len() == 4 && is_digits(s) => return format!("{}-01-01", s),
        Some((year, month)) if year.len() == 4 && month.len() == 2 && is_digits(year) && is_digits(month) => {
            return format!("{}-01", s)
        }
        _ => {}
    }

    let Some(split) = s.find(['T', 't', ' ']) else {
        return s.to_string();
    };
    let (date, rest) = s.split_at(split);
    let (separator, rest) = rest.split_at(1);
    let zone_at = rest.find(['+', '-', 'Z', 'z']).unwrap_or(rest.len());
    let (clock, zone) = rest.split_at(zone_at);

    let mut expanded = format!("{}{}{}", date, separator, clock);
    if date.contains('-') && clock.len() == 2 && is_digits(clock) {
        expanded.push_str(":00");
    }
    expanded.push_str(zone);
    if zone.len() == 3 && zone.starts_with(['+', '-']) && is_digits(&zone[1..]) {
        expanded.push_str(":00");
    }
    expanded
}
