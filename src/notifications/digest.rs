//! Aggregated notification content built from already-queried tasks.

use chrono::{DateTime, Utc};

use crate::models::Task;
use crate::notifications::windows::{OverdueBuckets, TimeRange};

/// All of a user's pending overdue tasks, grouped by how late they are.
#[derive(Debug, Clone, PartialEq)]
pub struct OverdueReport {
    pub generated_at: DateTime<Utc>,
    pub buckets: OverdueBuckets,
}

impl OverdueReport {
    /// `None` when nothing is overdue.
    pub fn build(overdue: Vec<Task>, now: DateTime<Utc>) -> Option<Self> {
        let buckets = OverdueBuckets::partition(overdue, now);
        if buckets.is_empty() {
            return None;
        }
        Some(Self {
            generated_at: now,
            buckets,
        })
    }

    pub fn total(&self) -> usize {
        self.buckets.len()
    }
}

/// Monday summary: this week's tasks, older pending ones, and what got done.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyDigest {
    pub week: TimeRange,
    pub generated_at: DateTime<Utc>,
    pub week_tasks: Vec<Task>,
    pub overdue_tasks: Vec<Task>,
    pub completed_tasks: Vec<Task>,
}

impl WeeklyDigest {
    /// `None` when there is nothing due this week and nothing overdue; completed
    /// tasks alone do not warrant an email.
    pub fn build(
        week: TimeRange,
        now: DateTime<Utc>,
        week_tasks: Vec<Task>,
        overdue_tasks: Vec<Task>,
        completed_tasks: Vec<Task>,
    ) -> Option<Self> {
        if week_tasks.is_empty() && overdue_tasks.is_empty() {
            return None;
        }
        Some(Self {
            week,
            generated_at: now,
            week_tasks,
            overdue_tasks,
            completed_tasks,
        })
    }

    pub fn pending_this_week(&self) -> usize {
        self.week_tasks.iter().filter(|task| !task.completed).count()
    }
}
