//! Conversion between the API's millisecond timestamps and `chrono` datetimes.
//!
//! All conversions are done in UTC. Use [`DateTime::with_timezone`] (or
//! [`crate::AwattarZone::timezone`]) to render a converted value in local time.

use chrono::{DateTime, TimeZone, Utc};

/// Converts milliseconds since the Unix epoch to a UTC datetime.
///
/// Returns `None` if `ms` is outside the range `chrono` can represent.
pub fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Converts a datetime in any time zone to milliseconds since the Unix epoch.
///
/// Sub-millisecond precision is truncated.
pub fn datetime_to_millis<TZ>(dt: &DateTime<TZ>) -> i64
where
    TZ: TimeZone,
{
    dt.timestamp_millis()
}
