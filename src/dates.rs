//! Timezone-adjusted display of due dates.
//!
//! Tasks carry the browser offset of their creator (`getTimezoneOffset`, minutes
//! *west* of UTC, so UTC-5 is `300`). Emails render due dates in that offset so the
//! owner sees the same wall-clock time they picked.

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use std::fmt;

/// Converts a browser offset (minutes west of UTC) into a chrono offset.
/// Out-of-range values fall back to UTC.
pub fn offset_from_minutes_west(minutes_west: i32) -> FixedOffset {
    FixedOffset::west_opt(minutes_west * 60).unwrap_or_else(|| Utc.fix())
}

pub fn to_local(instant: DateTime<Utc>, minutes_west: i32) -> DateTime<FixedOffset> {
    instant.with_timezone(&offset_from_minutes_west(minutes_west))
}

/// "Mar 5, 2025 14:30 (UTC-05:00)"
pub fn format_due_date(due: DateTime<Utc>, minutes_west: i32) -> String {
    to_local(due, minutes_west)
        .format("%b %-d, %Y %H:%M (UTC%:z)")
        .to_string()
}

/// Coarse "how long until due" label, computed on calendar days in the task's offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaysRemaining {
    Overdue,
    Today,
    Tomorrow,
    InDays(i64),
}

impl fmt::Display for DaysRemaining {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DaysRemaining::Overdue => f.write_str("Overdue"),
            DaysRemaining::Today => f.write_str("Today"),
            DaysRemaining::Tomorrow => f.write_str("Tomorrow"),
            DaysRemaining::InDays(days) => write!(f, "{} days", days),
        }
    }
}

pub fn days_remaining(due: DateTime<Utc>, minutes_west: i32, now: DateTime<Utc>) -> DaysRemaining {
    if due < now {
        return DaysRemaining::Overdue;
    }

    let due_day = to_local(due, minutes_west).date_naive();
    let today = to_local(now, minutes_west).date_naive();

    match due_day.signed_duration_since(today).num_days() {
        0 => DaysRemaining::Today,
        1 => DaysRemaining::Tomorrow,
        days => DaysRemaining::InDays(days),
    }
}

/// Human form of an elapsed duration, e.g. "3 days" or "5 hours".
pub fn describe_elapsed(elapsed: Duration) -> String {
    let days = elapsed.num_days();
    if days >= 1 {
        return if days == 1 { "1 day".to_string() } else { format!("{} days", days) };
    }
    match elapsed.num_hours() {
        0 => "less than an hour".to_string(),
        1 => "1 hour".to_string(),
        hours => format!("{} hours", hours),
    }
}
