use crate::{
    auth::{
        generate_reset_token, generate_token, hash_password, token::RESET_TOKEN_TTL_HOURS,
        verify_password, verify_reset_token, AuthResponse, AuthenticatedUserId,
        ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
    },
    error::AppError,
    models::{ProfileUpdate, User, UserRecord},
    notifications::EmailService,
};
use actix_web::{get, post, put, web, HttpResponse, Responder};
use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use url::Url;
use validator::Validate;

const USER_COLUMNS: &str = "id, name, email, created_at";

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `<frontend>/reset-password?token=<token>`; a trailing slash on the base is ignored.
fn reset_link(frontend_url: &str, token: &str) -> Result<String, AppError> {
    let base = frontend_url.trim_end_matches('/');
    let mut url = Url::parse(&format!("{}/reset-password", base))
        .map_err(|e| AppError::InternalServerError(format!("Invalid FRONTEND_URL {:?}: {}", base, e)))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url.to_string())
}

async fn find_record_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>, AppError> {
    let sql = format!("SELECT {} FROM users WHERE email = $1", UserRecord::COLUMNS);
    let record = sqlx::query_as::<_, UserRecord>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(record)
}

async fn find_record(pool: &PgPool, user_id: i32) -> Result<UserRecord, AppError> {
    let sql = format!("SELECT {} FROM users WHERE id = $1", UserRecord::COLUMNS);
    sqlx::query_as::<_, UserRecord>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Register a new user
///
/// Creates a new user account and returns an authentication token.
#[post("/register")]
pub async fn register(
    pool: web::Data<PgPool>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;
    let email = normalize_email(&register_data.email);

    if find_record_by_email(&pool, &email).await?.is_some() {
        return Err(AppError::BadRequest("Email already registered".into()));
    }

    let password_hash = hash_password(&register_data.password).await?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(&register_data.name)
    .bind(&email)
    .bind(password_hash)
    .fetch_one(&**pool)
    .await
    .map_err(AppError::on_conflict("Email already registered"))?;

    log::info!("registered user {}", user.id);
    let token = generate_token(user.id)?;

    Ok(HttpResponse::Created().json(AuthResponse { token, user }))
}

/// Login user
///
/// Authenticates a user and returns an authentication token.
#[post("/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let record = find_record_by_email(&pool, &normalize_email(&login_data.email))
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;

    if !verify_password(&login_data.password, &record.password_hash).await? {
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let token = generate_token(record.id)?;
    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        user: record.into(),
    }))
}

/// Starts password recovery: stores a one-hour reset token on the account and
/// emails a link that redeems it.
#[post("/forgot-password")]
pub async fn forgot_password(
    pool: web::Data<PgPool>,
    email: web::Data<EmailService>,
    request: web::Json<ForgotPasswordRequest>,
) -> Result<impl Responder, AppError> {
    request.validate()?;

    let record = find_record_by_email(&pool, &normalize_email(&request.email))
        .await?
        .ok_or_else(|| AppError::NotFound("No account with that email".into()))?;

    let token = generate_reset_token(record.id)?;
    let expires = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);

    sqlx::query(
        "UPDATE users SET reset_password_token = $1, reset_password_expires = $2, updated_at = NOW()
         WHERE id = $3",
    )
    .bind(&token)
    .bind(expires)
    .bind(record.id)
    .execute(&**pool)
    .await?;

    let link = reset_link(email.frontend_url(), &token)?;
    let delivery = email.send_password_reset(&record.into(), &link).await?;
    log::info!("password reset email {} queued", delivery.message_id);

    Ok(HttpResponse::Ok().json(json!({
        "message": "Password reset email sent"
    })))
}

/// Redeems a reset token and sets a new password.
#[put("/reset-password")]
pub async fn reset_password(
    pool: web::Data<PgPool>,
    request: web::Json<ResetPasswordRequest>,
) -> Result<impl Responder, AppError> {
    request.validate()?;

    let claims = verify_reset_token(&request.token)?;
    let record = find_record(&pool, claims.sub).await?;

    if let Err(reason) = record.reset_token_matches(&request.token, Utc::now()) {
        log::debug!("reset token refused for user {}: {:?}", record.id, reason);
        return Err(AppError::BadRequest("Invalid or expired token".into()));
    }

    let password_hash = hash_password(&request.password).await?;
    sqlx::query(
        "UPDATE users
         SET password_hash = $1, reset_password_token = NULL, reset_password_expires = NULL, updated_at = NOW()
         WHERE id = $2",
    )
    .bind(password_hash)
    .bind(record.id)
    .execute(&**pool)
    .await?;

    log::info!("password reset for user {}", record.id);
    Ok(HttpResponse::Ok().json(json!({
        "message": "Password updated successfully"
    })))
}

#[get("/profile")]
pub async fn get_profile(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    let user: User = find_record(&pool, user_id.0).await?.into();
    Ok(HttpResponse::Ok().json(user))
}

/// Updates name, email and/or password. The new email must not belong to another account.
#[put("/profile")]
pub async fn update_profile(
    pool: web::Data<PgPool>,
    user_id: AuthenticatedUserId,
    update: web::Json<ProfileUpdate>,
) -> Result<impl Responder, AppError> {
    update.validate()?;
    let update = update.into_inner();
    let mut record = find_record(&pool, user_id.0).await?;

    if let Some(email) = update.email.as_deref().map(normalize_email) {
        if email != record.email {
            let taken = sqlx::query_as::<_, (i32,)>("SELECT id FROM users WHERE email = $1 AND id <> $2")
                .bind(&email)
                .bind(record.id)
                .fetch_optional(&**pool)
                .await?;
            if taken.is_some() {
                return Err(AppError::BadRequest("Email already in use".into()));
            }
            record.email = email;
        }
    }
    if let Some(name) = update.name {
        record.name = name;
    }
    if let Some(password) = update.password {
        record.password_hash = hash_password(&password).await?;
    }

    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET name = $1, email = $2, password_hash = $3, updated_at = NOW()
         WHERE id = $4 RETURNING {}",
        USER_COLUMNS
    ))
    .bind(&record.name)
    .bind(&record.email)
    .bind(&record.password_hash)
    .bind(record.id)
    .fetch_one(&**pool)
    .await
    .map_err(AppError::on_conflict("Email already in use"))?;

    Ok(HttpResponse::Ok().json(user))
}
