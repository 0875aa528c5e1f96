use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

fn enabled() -> bool {
    true
}

/// Which notification emails a subscriber wants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct NotificationPreferences {
    /// Reminders for tasks coming due in the next couple of days.
    #[serde(default = "enabled")]
    pub task_reminders: bool,
    /// Alerts for tasks due today and overdue reports.
    #[serde(default = "enabled")]
    pub due_date_alerts: bool,
    /// Monday summary of the week.
    #[serde(default)]
    pub weekly_digest: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            task_reminders: true,
            due_date_alerts: true,
            weekly_digest: false,
        }
    }
}

/// A single preference flag, used to select subscribers for a scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preference {
    TaskReminders,
    DueDateAlerts,
    WeeklyDigest,
}

impl Preference {
    /// Backing column in `notification_subscriptions`.
    pub fn column(&self) -> &'static str {
        match self {
            Preference::TaskReminders => "task_reminders",
            Preference::DueDateAlerts => "due_date_alerts",
            Preference::WeeklyDigest => "weekly_digest",
        }
    }

    pub fn is_enabled_in(&self, preferences: &NotificationPreferences) -> bool {
        match self {
            Preference::TaskReminders => preferences.task_reminders,
            Preference::DueDateAlerts => preferences.due_date_alerts,
            Preference::WeeklyDigest => preferences.weekly_digest,
        }
    }
}

/// A user's email notification subscription. Each user has at most one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct NotificationSubscription {
    pub id: Uuid,
    pub user_id: i32,
    pub email: String,
    #[sqlx(flatten)]
    pub preferences: NotificationPreferences,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationSubscription {
    pub const COLUMNS: &'static str = "id, user_id, email, task_reminders, due_date_alerts, weekly_digest, \
         active, created_at, updated_at";
}

/// Body of `POST /api/tasks/notifications/subscribe`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub preferences: NotificationPreferences,
}
