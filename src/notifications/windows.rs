//! Due-date windows: classifying tasks against the current time.
//!
//! Everything here is a pure function of `now`, which keeps the scheduler jobs
//! testable without a clock or a database.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

use crate::models::Task;

/// Overdue by at most this long counts as "recent".
pub const RECENT_OVERDUE_HOURS: i64 = 24;
/// Overdue by at most this long counts as "moderate"; beyond it, "severe".
pub const MODERATE_OVERDUE_HOURS: i64 = 72;
/// Horizon for the daily "coming up" reminders.
pub const UPCOMING_REMINDER_HOURS: i64 = 48;

/// How late an overdue task is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OverdueTier {
    Recent,
    Moderate,
    Severe,
}

impl OverdueTier {
    pub fn for_lateness(late_by: Duration) -> Self {
        if late_by <= Duration::hours(RECENT_OVERDUE_HOURS) {
            OverdueTier::Recent
        } else if late_by <= Duration::hours(MODERATE_OVERDUE_HOURS) {
            OverdueTier::Moderate
        } else {
            OverdueTier::Severe
        }
    }

    pub fn heading(&self) -> &'static str {
        match self {
            OverdueTier::Recent => "Overdue in the last 24 hours",
            OverdueTier::Moderate => "Overdue for 1 to 3 days",
            OverdueTier::Severe => "Overdue for more than 3 days",
        }
    }
}

/// Where a due date falls relative to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueWindow {
    Overdue(OverdueTier),
    Within24Hours,
    Within7Days,
    Later,
}

impl DueWindow {
    pub fn classify(due: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if due < now {
            return DueWindow::Overdue(OverdueTier::for_lateness(now - due));
        }
        let remaining = due - now;
        if remaining <= Duration::hours(24) {
            DueWindow::Within24Hours
        } else if remaining <= Duration::days(7) {
            DueWindow::Within7Days
        } else {
            DueWindow::Later
        }
    }
}

/// Overdue tasks split by tier. Each bucket keeps the input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverdueBuckets {
    pub recent: Vec<Task>,
    pub moderate: Vec<Task>,
    pub severe: Vec<Task>,
}

impl OverdueBuckets {
    /// Partitions `tasks` by how late they are at `now`. Tasks that are not
    /// overdue are dropped.
    pub fn partition(tasks: impl IntoIterator<Item = Task>, now: DateTime<Utc>) -> Self {
        let mut buckets = Self::default();
        for task in tasks {
            match DueWindow::classify(task.due_date, now) {
                DueWindow::Overdue(OverdueTier::Recent) => buckets.recent.push(task),
                DueWindow::Overdue(OverdueTier::Moderate) => buckets.moderate.push(task),
                DueWindow::Overdue(OverdueTier::Severe) => buckets.severe.push(task),
                _ => {}
            }
        }
        buckets
    }

    pub fn len(&self) -> usize {
        self.recent.len() + self.moderate.len() + self.severe.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-empty tiers, most recent first.
    pub fn tiers(&self) -> impl Iterator<Item = (OverdueTier, &[Task])> {
        [
            (OverdueTier::Recent, self.recent.as_slice()),
            (OverdueTier::Moderate, self.moderate.as_slice()),
            (OverdueTier::Severe, self.severe.as_slice()),
        ]
        .into_iter()
        .filter(|(_, tasks)| !tasks.is_empty())
    }
}

/// A half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// `[now, now + 48h)`
    pub fn upcoming(now: DateTime<Utc>) -> Self {
        Self {
            start: now,
            end: now + Duration::hours(UPCOMING_REMINDER_HOURS),
        }
    }

    /// The UTC calendar day containing `now`.
    pub fn day_of(now: DateTime<Utc>) -> Self {
        let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    /// Monday 00:00 through the following Monday 00:00 (UTC) for the week containing `now`.
    pub fn week_of(now: DateTime<Utc>) -> Self {
        let days_since_monday = i64::from(now.weekday().num_days_from_monday());
        let start = Self::day_of(now).start - Duration::days(days_since_monday);
        Self {
            start,
            end: start + Duration::days(7),
        }
    }
}
