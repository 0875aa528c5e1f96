//! Queries the scheduled jobs run against the database.
//!
//! [`ReminderStore`] is the seam between the jobs and PostgreSQL; the jobs only
//! see tasks, users and subscriptions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{NotificationSubscription, Preference, Task, User};
use crate::notifications::windows::TimeRange;

#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Active subscriptions with `preference` switched on.
    async fn active_subscriptions(
        &self,
        preference: Preference,
    ) -> Result<Vec<NotificationSubscription>, AppError>;

    async fn find_user(&self, user_id: i32) -> Result<Option<User>, AppError>;

    /// Pending tasks due inside `range`, soonest first.
    async fn pending_tasks_due_in(&self, user_id: i32, range: TimeRange) -> Result<Vec<Task>, AppError>;

    /// Pending tasks due before `before`, oldest first.
    async fn overdue_tasks(&self, user_id: i32, before: DateTime<Utc>) -> Result<Vec<Task>, AppError>;

    /// Tasks due inside `range` whether or not they are completed.
    async fn tasks_due_in(&self, user_id: i32, range: TimeRange) -> Result<Vec<Task>, AppError>;

    /// Tasks marked completed inside `range`, by last update time.
    async fn completed_in(&self, user_id: i32, range: TimeRange) -> Result<Vec<Task>, AppError>;
}

#[derive(Clone)]
pub struct PgReminderStore {
    pool: PgPool,
}

impl PgReminderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderStore for PgReminderStore {
    async fn active_subscriptions(
        &self,
        preference: Preference,
    ) -> Result<Vec<NotificationSubscription>, AppError> {
        let sql = format!(
            "SELECT {} FROM notification_subscriptions WHERE active = TRUE AND {} = TRUE ORDER BY created_at",
            NotificationSubscription::COLUMNS,
            preference.column()
        );
        let subscriptions = sqlx::query_as::<_, NotificationSubscription>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(subscriptions)
    }

    async fn find_user(&self, user_id: i32) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT id, name, email, created_at FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn pending_tasks_due_in(&self, user_id: i32, range: TimeRange) -> Result<Vec<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks
             WHERE user_id = $1 AND completed = FALSE AND due_date >= $2 AND due_date < $3
             ORDER BY due_date ASC",
            Task::COLUMNS
        );
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(user_id)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    async fn overdue_tasks(&self, user_id: i32, before: DateTime<Utc>) -> Result<Vec<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks
             WHERE user_id = $1 AND completed = FALSE AND due_date < $2
             ORDER BY due_date ASC",
            Task::COLUMNS
        );
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(user_id)
            .bind(before)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    async fn tasks_due_in(&self, user_id: i32, range: TimeRange) -> Result<Vec<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks
             WHERE user_id = $1 AND due_date >= $2 AND due_date < $3
             ORDER BY due_date ASC",
            Task::COLUMNS
        );
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(user_id)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    async fn completed_in(&self, user_id: i32, range: TimeRange) -> Result<Vec<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks
             WHERE user_id = $1 AND completed = TRUE AND updated_at >= $2 AND updated_at < $3
             ORDER BY updated_at ASC",
            Task::COLUMNS
        );
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(user_id)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }
}
