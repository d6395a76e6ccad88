//! Per-row expressions derived from the pickup timestamp.
//!
//! These are evaluated lazily while scanning, never stored as columns. Timestamps are seconds
//! since the Unix epoch, interpreted as UTC.

use time::OffsetDateTime;

const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

/// Hour of day in `0..24`.
///
/// Defined for every timestamp, including those outside the calendar range of [time].
#[inline]
pub fn hour(timestamp: i64) -> usize {
    (timestamp.rem_euclid(SECONDS_PER_DAY) / SECONDS_PER_HOUR) as usize
}

/// Zero-based month index in `0..12`, or `None` if the timestamp cannot be represented as a
/// calendar date.
#[inline]
pub fn month_index(timestamp: i64) -> Option<u8> {
    OffsetDateTime::from_unix_timestamp(timestamp)
        .ok()
        .map(|datetime| u8::from(datetime.month()) - 1)
}

/// Day of week with Monday as 0.
#[inline]
pub fn day_of_week(timestamp: i64) -> Option<u8> {
    OffsetDateTime::from_unix_timestamp(timestamp)
        .ok()
        .map(|datetime| datetime.weekday().number_days_from_monday())
}
