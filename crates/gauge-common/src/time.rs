//! Time handling: observation timestamps, sync windows and ISO-8601 intervals.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Timestamp of a single observation, keeping the upstream UTC offset.
///
/// Equality compares instants, so `2024-01-01T00:00:00Z` and
/// `2023-12-31T19:00:00-05:00` are the same observation time.
pub type ObservationTime = DateTime<FixedOffset>;

/// Parse an upstream or stored timestamp.
///
/// Naive datetimes carry no offset upstream (SFWMD aggregates, for one)
/// and are stamped `+00:00`. Once written, a record holds the RFC 3339
/// form, not the upstream string.
///
/// Supports:
/// - RFC 3339 with offset: "2024-01-15T12:00:00.000-05:00"
/// - Naive datetimes (assumed UTC): "2024-01-15T12:00:00", "2024-01-15 12:00:00"
/// - Minute precision (assumed UTC): "2024-01-15T12:00"
pub fn parse_timestamp(s: &str) -> Option<ObservationTime> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&ndt).into());
        }
    }

    None
}

/// Convert epoch milliseconds into an observation time.
pub fn timestamp_from_millis(millis: i64) -> Option<ObservationTime> {
    DateTime::from_timestamp_millis(millis).map(Into::into)
}

/// Parse an ISO-8601 duration such as `PT15M`, `PT6H` or `P1D`.
///
/// Only integer week, day, hour, minute and second components are
/// accepted. Year and month components have no fixed length and are
/// rejected, as is a zero-length interval.
pub fn parse_interval(s: &str) -> Result<Duration> {
    let invalid = || SyncError::InvalidInterval(s.to_string());

    let rest = s.trim().strip_prefix('P').ok_or_else(invalid)?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((_, "")) => return Err(invalid()),
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut seconds = sum_components(date_part, &[('W', 604_800), ('D', 86_400)]).ok_or_else(invalid)?;
    if let Some(time) = time_part {
        seconds = sum_components(time, &[('H', 3_600), ('M', 60), ('S', 1)])
            .and_then(|t| seconds.checked_add(t))
            .ok_or_else(invalid)?;
    }

    if seconds <= 0 {
        return Err(invalid());
    }

    Ok(Duration::seconds(seconds))
}

/// Sum `<n><unit>` pairs; units must appear in the given order, at most once.
fn sum_components(part: &str, units: &[(char, i64)]) -> Option<i64> {
    let mut total = 0i64;
    let mut digits = String::new();
    let mut next_unit = 0;

    for c in part.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let offset = units[next_unit..].iter().position(|(unit, _)| *unit == c)?;
        let index = next_unit + offset;
        let amount: i64 = digits.parse().ok()?;
        total = total.checked_add(amount.checked_mul(units[index].1)?)?;

        digits.clear();
        next_unit = index + 1;
    }

    if !digits.is_empty() {
        return None;
    }

    Some(total)
}

/// The window of upstream observations requested in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window covering the `interval` that ends at `now`.
    pub fn trailing(interval: Duration, now: DateTime<Utc>) -> Self {
        Self {
            start: now - interval,
            end: now,
        }
    }
}
