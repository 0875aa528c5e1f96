use crate::{
    auth::AuthenticatedUserId,
    error::AppError,
    models::{NotificationSubscription, SubscribeRequest},
};
use actix_web::{get, post, web, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Row returned by the subscribe upsert. `created` is false when an existing row was updated.
#[derive(sqlx::FromRow)]
struct Upserted {
    #[sqlx(flatten)]
    subscription: NotificationSubscription,
    created: bool,
}

/// Creates or replaces the caller's subscription and re-activates it.
///
/// ## Responses:
/// - `201 Created`: first subscription for this user.
/// - `200 OK`: an existing subscription was updated.
/// - `422 Unprocessable Entity`: invalid email.
#[post("/subscribe")]
pub async fn subscribe(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
    request: web::Json<SubscribeRequest>,
) -> Result<impl Responder, AppError> {
    request.validate()?;
    let SubscribeRequest { email, preferences } = request.into_inner();
    let email = email.trim().to_string();

    let upserted = sqlx::query_as::<_, Upserted>(&format!(
        "INSERT INTO notification_subscriptions AS s
             (id, user_id, email, task_reminders, due_date_alerts, weekly_digest, active)
         VALUES ($1, $2, $3, $4, $5, $6, TRUE)
         ON CONFLICT (user_id) DO UPDATE
         SET email = EXCLUDED.email, task_reminders = EXCLUDED.task_reminders,
             due_date_alerts = EXCLUDED.due_date_alerts, weekly_digest = EXCLUDED.weekly_digest,
             active = TRUE, updated_at = NOW()
         RETURNING {}, (s.xmax = 0) AS created",
        NotificationSubscription::COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(user_id.0)
    .bind(&email)
    .bind(preferences.task_reminders)
    .bind(preferences.due_date_alerts)
    .bind(preferences.weekly_digest)
    .fetch_one(&**pool)
    .await?;

    if upserted.created {
        log::info!("user {} subscribed to notifications", user_id.0);
        Ok(HttpResponse::Created().json(upserted.subscription))
    } else {
        log::info!("user {} updated their notification subscription", user_id.0);
        Ok(HttpResponse::Ok().json(upserted.subscription))
    }
}

#[post("/unsubscribe")]
pub async fn unsubscribe(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    let result = sqlx::query(
        "UPDATE notification_subscriptions SET active = FALSE, updated_at = NOW()
         WHERE user_id = $1 AND active = TRUE",
    )
    .bind(user_id.0)
    .execute(&**pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("No active subscription found".into()));
    }

    log::info!("user {} unsubscribed from notifications", user_id.0);
    Ok(HttpResponse::Ok().json(json!({
        "message": "Unsubscribed from email notifications"
    })))
}

/// The caller's active subscription.
#[get("/preferences")]
pub async fn get_preferences(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    let subscription = sqlx::query_as::<_, NotificationSubscription>(&format!(
        "SELECT {} FROM notification_subscriptions WHERE user_id = $1 AND active = TRUE",
        NotificationSubscription::COLUMNS
    ))
    .bind(user_id.0)
    .fetch_optional(&**pool)
    .await?
    .ok_or_else(|| AppError::NotFound("No active subscription found".into()))?;

    Ok(HttpResponse::Ok().json(subscription))
}
