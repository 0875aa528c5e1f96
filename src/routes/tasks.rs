use crate::{
    auth::AuthenticatedUserId,
    error::AppError,
    models::{CompletionFilter, Task, TaskInput, TaskPriority, TaskQuery, TaskUpdate, User},
    notifications::EmailService,
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Lists a user's tasks, newest first, optionally narrowed by completion and priority.
async fn list_tasks(
    pool: &PgPool,
    user_id: i32,
    completed: Option<bool>,
    priority: Option<TaskPriority>,
) -> Result<Vec<Task>, AppError> {
    let mut sql = format!("SELECT {} FROM tasks WHERE user_id = $1", Task::COLUMNS);
    let mut conditions: Vec<&str> = Vec::new();
    if completed.is_some() {
        conditions.push("completed");
    }
    if priority.is_some() {
        conditions.push("priority");
    }
    for (i, column) in conditions.iter().enumerate() {
        sql.push_str(&format!(" AND {} = ${}", column, i + 2));
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut query = sqlx::query_as::<_, Task>(&sql).bind(user_id);
    if let Some(completed) = completed {
        query = query.bind(completed);
    }
    if let Some(priority) = priority {
        query = query.bind(priority);
    }

    Ok(query.fetch_all(pool).await?)
}

/// Loads a task if it exists and belongs to `user_id`. Someone else's task is
/// indistinguishable from a missing one.
async fn find_owned_task(pool: &PgPool, task_id: Uuid, user_id: i32) -> Result<Task, AppError> {
    let sql = format!("SELECT {} FROM tasks WHERE id = $1", Task::COLUMNS);
    let task = sqlx::query_as::<_, Task>(&sql)
        .bind(task_id)
        .fetch_optional(pool)
        .await?;

    match task {
        Some(task) if task.user_id == user_id => Ok(task),
        _ => Err(AppError::NotFound("Task not found".into())),
    }
}

/// Retrieves the authenticated user's tasks.
///
/// ## Query Parameters:
/// - `completed` (optional): `true` or `false`.
/// - `priority` (optional): `low`, `medium` or `high`.
#[get("")]
pub async fn get_tasks(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
    query: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    let tasks = list_tasks(&pool, user_id.0, query.completed, query.priority).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a new task for the authenticated user.
///
/// ## Responses:
/// - `201 Created`: the new `Task`.
/// - `400 Bad Request`: malformed JSON or a missing `due_date`.
/// - `422 Unprocessable Entity`: validation failed (empty title, bad time zone).
#[post("")]
pub async fn create_task(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;
    let task = Task::new(task_data.into_inner(), user_id.0);

    let result = sqlx::query_as::<_, Task>(&format!(
        "INSERT INTO tasks (id, title, description, due_date, user_time_zone, timezone_offset, priority, completed, user_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {}",
        Task::COLUMNS
    ))
    .bind(task.id)
    .bind(task.title)
    .bind(task.description)
    .bind(task.due_date)
    .bind(task.user_time_zone)
    .bind(task.timezone_offset)
    .bind(task.priority)
    .bind(task.completed)
    .bind(task.user_id)
    .fetch_one(&**pool)
    .await?;

    log::debug!("user {} created task {}", user_id.0, result.id);
    Ok(HttpResponse::Created().json(result))
}

#[get("/filter/{status}")]
pub async fn filter_tasks(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
    status: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let filter = CompletionFilter::parse(&status);
    let tasks = list_tasks(&pool, user_id.0, filter.completed(), None).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

#[get("/priority/{level}")]
pub async fn tasks_by_priority(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
    level: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let priority: TaskPriority = level.parse().map_err(AppError::BadRequest)?;
    let tasks = list_tasks(&pool, user_id.0, None, Some(priority)).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Sends a sample reminder to the caller so they can check email delivery.
#[post("/send-test-email")]
pub async fn send_test_email(
    pool: web::Data<PgPool>,
    email: web::Data<EmailService>,
    user_id: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT id, name, email, created_at FROM users WHERE id = $1")
        .bind(user_id.0)
        .fetch_optional(&**pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let delivery = email.send_test_email(&user, Utc::now()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Test email sent to {}", user.email),
        "message_id": delivery.message_id
    })))
}

/// Retrieves a specific task by its ID.
///
/// ## Responses:
/// - `200 OK`: the `Task`.
/// - `404 Not Found`: no such task, or it belongs to another user.
#[get("/{id}")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = find_owned_task(&pool, task_id.into_inner(), user_id.0).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Updates the fields present in the body. An empty `description` clears it.
#[put("/{id}")]
pub async fn update_task(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskUpdate>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;
    let mut task = find_owned_task(&pool, task_id.into_inner(), user_id.0).await?;
    task.apply(task_data.into_inner());

    let result = sqlx::query_as::<_, Task>(&format!(
        "UPDATE tasks
         SET title = $1, description = $2, due_date = $3, user_time_zone = $4, timezone_offset = $5,
             priority = $6, completed = $7, updated_at = NOW()
         WHERE id = $8 AND user_id = $9
         RETURNING {}",
        Task::COLUMNS
    ))
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.due_date)
    .bind(&task.user_time_zone)
    .bind(task.timezone_offset)
    .bind(task.priority)
    .bind(task.completed)
    .bind(task.id)
    .bind(user_id.0)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(result))
}

#[delete("/{id}")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
        .bind(task_id.into_inner())
        .bind(user_id.0)
        .execute(&**pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Task not found".into()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Task deleted"
    })))
}
