//! Calendar helpers over millisecond timestamps in a fixed UTC offset.

use chrono::{DateTime, Datelike, FixedOffset, Months, Offset, TimeZone, Utc};

/// Fixed offset from whole minutes east of UTC. Out-of-range input falls back to UTC.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(utc)
}

pub fn utc() -> FixedOffset {
    Utc.fix()
}

pub fn to_datetime(ms: i64, offset: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    offset.timestamp_millis_opt(ms).single()
}

/// Milliseconds of the local midnight that starts `year-month-day`.
pub fn local_date_ms(year: i32, month: u32, day: u32, offset: &FixedOffset) -> Option<i64> {
    offset.with_ymd_and_hms(year, month, day, 0, 0, 0).single().map(|dt| dt.timestamp_millis())
}

/// Format with a `chrono` pattern, or an empty string for unrepresentable instants.
pub fn format_ms(ms: i64, offset: &FixedOffset, pattern: &str) -> String {
    to_datetime(ms, offset).map(|dt| dt.format(pattern).to_string()).unwrap_or_default()
}

/// Shift by whole calendar months, clamping the day to the target month's length.
pub fn shift_months(ms: i64, months: i32, offset: &FixedOffset) -> i64 {
    let Some(dt) = to_datetime(ms, offset) else { return ms };
    let delta = Months::new(months.unsigned_abs());
    let shifted = if months >= 0 { dt.checked_add_months(delta) } else { dt.checked_sub_months(delta) };
    shifted.map(|d| d.timestamp_millis()).unwrap_or(ms)
}

/// Local January 1st of the year containing `ms`.
pub fn year_start(ms: i64, offset: &FixedOffset) -> i64 {
    to_datetime(ms, offset)
        .and_then(|dt| local_date_ms(dt.year(), 1, 1, offset))
        .unwrap_or(ms)
}

/// Millisecond offset of the zone, used for epoch-aligned arithmetic in local time.
pub fn offset_ms(offset: &FixedOffset) -> i64 {
    offset.local_minus_utc() as i64 * 1000
}
