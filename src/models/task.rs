use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

lazy_static! {
    // IANA-style zone names ("UTC", "America/Bogota", "Etc/GMT+5").
    static ref TIMEZONE_REGEX: regex::Regex =
        regex::Regex::new(r"^[A-Za-z][A-Za-z0-9_+\-]*(/[A-Za-z0-9_+\-]+)*$").unwrap();
}

/// Offsets beyond ±14h do not exist on Earth.
const MAX_TIMEZONE_OFFSET_MINUTES: i32 = 14 * 60;

/// Represents the priority of a task.
/// Corresponds to the `task_priority` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Low priority.
    Low,
    /// Medium priority. Applied when a task is created without one.
    #[default]
    Medium,
    /// High priority.
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }

    /// Label used in notification emails.
    pub fn label(&self) -> &'static str {
        match self {
            TaskPriority::Low => "📝 Low",
            TaskPriority::Medium => "⚡ Medium",
            TaskPriority::High => "⚠️ High",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(format!("Invalid priority level: {}", other)),
        }
    }
}

/// Completion filter accepted by `GET /api/tasks/filter/{status}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionFilter {
    Completed,
    Pending,
    All,
}

impl CompletionFilter {
    /// Anything other than `completed` or `pending` lists every task.
    pub fn parse(status: &str) -> Self {
        match status {
            "completed" => CompletionFilter::Completed,
            "pending" => CompletionFilter::Pending,
            _ => CompletionFilter::All,
        }
    }

    pub fn completed(&self) -> Option<bool> {
        match self {
            CompletionFilter::Completed => Some(true),
            CompletionFilter::Pending => Some(false),
            CompletionFilter::All => None,
        }
    }
}

fn validate_timezone_offset(offset: i32) -> Result<(), ValidationError> {
    if offset.abs() > MAX_TIMEZONE_OFFSET_MINUTES {
        return Err(ValidationError::new("timezone_offset"));
    }
    Ok(())
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

/// Input structure for creating a task.
/// Contains validation rules for its fields.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    /// The title of the task.
    /// Must be between 1 and 200 characters.
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    /// An optional description for the task.
    /// Maximum length of 1000 characters if provided.
    #[validate(length(max = 1000))]
    pub description: Option<String>,

    /// When the task is due.
    pub due_date: DateTime<Utc>,

    /// The priority of the task. Defaults to medium.
    pub priority: Option<TaskPriority>,

    /// Zone name of the client that created the task.
    #[serde(default = "default_time_zone")]
    #[validate(
        length(max = 64),
        regex(path = "TIMEZONE_REGEX", message = "Invalid time zone name")
    )]
    pub user_time_zone: String,

    /// Minutes west of UTC, as reported by the browser.
    #[serde(default)]
    #[validate(custom = "validate_timezone_offset")]
    pub timezone_offset: i32,
}

/// Partial update for an existing task. Absent fields are left untouched;
/// an empty `description` clears it.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct TaskUpdate {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<TaskPriority>,
    pub completed: Option<bool>,
    #[validate(
        length(max = 64),
        regex(path = "TIMEZONE_REGEX", message = "Invalid time zone name")
    )]
    pub user_time_zone: Option<String>,
    #[validate(custom = "validate_timezone_offset")]
    pub timezone_offset: Option<i32>,
}

/// Represents a task entity as stored in the database and returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Task {
    /// Unique identifier for the task (UUID v4).
    pub id: Uuid,
    /// The title of the task.
    pub title: String,
    /// An optional description for the task.
    pub description: Option<String>,
    /// When the task is due.
    pub due_date: DateTime<Utc>,
    /// Zone name recorded when the task was created.
    pub user_time_zone: String,
    /// Minutes west of UTC used when displaying `due_date` to its owner.
    pub timezone_offset: i32,
    /// The priority of the task.
    pub priority: TaskPriority,
    /// Whether the task is done.
    pub completed: bool,
    /// Identifier of the user who owns the task.
    pub user_id: i32,
    /// Timestamp of when the task was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last update to the task.
    pub updated_at: DateTime<Utc>,
}

/// Represents query parameters for filtering tasks when listing them.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TaskQuery {
    /// Filter tasks by completion.
    pub completed: Option<bool>,
    /// Filter tasks by priority.
    pub priority: Option<TaskPriority>,
}

impl Task {
    /// Columns selected for a task row, in `FromRow` order.
    pub const COLUMNS: &'static str = "id, title, description, due_date, user_time_zone, timezone_offset, \
         priority, completed, user_id, created_at, updated_at";

    /// Creates a new `Task` instance from `TaskInput` and the owner's `user_id`.
    /// Sets `created_at`, `updated_at` to the current time, and `id` to a new UUID.
    pub fn new(input: TaskInput, user_id: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description.filter(|d| !d.is_empty()),
            due_date: input.due_date,
            user_time_zone: input.user_time_zone,
            timezone_offset: input.timezone_offset,
            priority: input.priority.unwrap_or_default(),
            completed: false,
            user_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies the fields present in `update`.
    pub fn apply(&mut self, update: TaskUpdate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = if description.is_empty() { None } else { Some(description) };
        }
        if let Some(due_date) = update.due_date {
            self.due_date = due_date;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        if let Some(zone) = update.user_time_zone {
            self.user_time_zone = zone;
        }
        if let Some(offset) = update.timezone_offset {
            self.timezone_offset = offset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn input(title: &str) -> TaskInput {
        TaskInput {
            title: title.to_string(),
            description: Some("Test Description".to_string()),
            due_date: Utc::now() + Duration::days(1),
            priority: None,
            user_time_zone: "America/Bogota".to_string(),
            timezone_offset: 300,
        }
    }

    #[test]
    fn test_task_creation() {
        let task = Task::new(input("Test Task"), 1);
        assert_eq!(task.title, "Test Task");
        assert_eq!(task.user_id, 1);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(!task.completed);
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn test_task_input_validation() {
        assert!(input("Valid Task").validate().is_ok());
        assert!(input("").validate().is_err());
        assert!(input(&"a".repeat(201)).validate().is_err());

        let mut long_description = input("Valid");
        long_description.description = Some("b".repeat(1001));
        assert!(long_description.validate().is_err());

        let mut bad_zone = input("Valid");
        bad_zone.user_time_zone = "not a zone; DROP".to_string();
        assert!(bad_zone.validate().is_err());

        let mut bad_offset = input("Valid");
        bad_offset.timezone_offset = 900;
        assert!(bad_offset.validate().is_err());
    }

    #[test]
    fn test_task_input_defaults() {
        let due = "2030-05-01T12:00:00Z";
        let parsed: TaskInput =
            serde_json::from_value(serde_json::json!({ "title": "Pay rent", "due_date": due })).unwrap();
        assert_eq!(parsed.user_time_zone, "UTC");
        assert_eq!(parsed.timezone_offset, 0);
        assert!(parsed.priority.is_none());
        assert!(parsed.validate().is_ok());

        let missing_due: Result<TaskInput, _> =
            serde_json::from_value(serde_json::json!({ "title": "Pay rent" }));
        assert!(missing_due.is_err());
    }

    #[test]
    fn test_apply_partial_update() {
        let mut task = Task::new(input("Original"), 3);
        let original_due = task.due_date;

        task.apply(TaskUpdate {
            completed: Some(true),
            priority: Some(TaskPriority::High),
            ..Default::default()
        });
        assert!(task.completed);
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.title, "Original");
        assert_eq!(task.due_date, original_due);
        assert_eq!(task.description.as_deref(), Some("Test Description"));

        task.apply(TaskUpdate {
            description: Some(String::new()),
            title: Some("Renamed".to_string()),
            ..Default::default()
        });
        assert_eq!(task.description, None);
        assert_eq!(task.title, "Renamed");
    }

    #[test]
    fn test_priority_parsing() {
        assert_eq!("high".parse::<TaskPriority>(), Ok(TaskPriority::High));
        assert_eq!("low".parse::<TaskPriority>(), Ok(TaskPriority::Low));
        assert!("urgent".parse::<TaskPriority>().is_err());
        assert_eq!(TaskPriority::Medium.to_string(), "medium");
    }

    #[test]
    fn test_completion_filter() {
        assert_eq!(CompletionFilter::parse("completed").completed(), Some(true));
        assert_eq!(CompletionFilter::parse("pending").completed(), Some(false));
        assert_eq!(CompletionFilter::parse("whatever").completed(), None);
    }
}
