use crate::error::AppError;
use chrono::Duration;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Lifetime of a session token.
pub const ACCESS_TOKEN_TTL_DAYS: i64 = 30;
/// Lifetime of a password-reset token.
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// What a token may be used for. Reset tokens never authenticate API calls.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    #[default]
    Access,
    PasswordReset,
}

/// Represents the claims encoded within a JWT (JSON Web Token).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject of the token, the user's id.
    pub sub: i32,
    /// Expiration timestamp (seconds since epoch) for the token.
    pub exp: usize,
    #[serde(default)]
    pub purpose: TokenPurpose,
}

fn jwt_secret() -> Result<String, AppError> {
    std::env::var("JWT_SECRET").map_err(|_| {
        log::error!("JWT_SECRET is not set");
        AppError::InternalServerError("JWT_SECRET not set".into())
    })
}

fn sign(user_id: i32, ttl: Duration, purpose: TokenPurpose) -> Result<String, AppError> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| AppError::InternalServerError("Token expiry out of range".into()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id,
        exp: expiration,
        purpose,
    };

    let secret = jwt_secret()?;
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
}

fn decode_claims(token: &str) -> Result<Claims, AppError> {
    let secret = jwt_secret()?;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {:?}", e.kind())))
}

/// Generates a session JWT for a given user ID, valid for 30 days.
///
/// Requires the `JWT_SECRET` environment variable; returns
/// `AppError::InternalServerError` when it is unset or encoding fails.
pub fn generate_token(user_id: i32) -> Result<String, AppError> {
    sign(user_id, Duration::days(ACCESS_TOKEN_TTL_DAYS), TokenPurpose::Access)
}

/// Generates a one-hour token that can only be redeemed at `PUT /api/users/reset-password`.
pub fn generate_reset_token(user_id: i32) -> Result<String, AppError> {
    sign(
        user_id,
        Duration::hours(RESET_TOKEN_TTL_HOURS),
        TokenPurpose::PasswordReset,
    )
}

/// Verifies a session JWT and decodes its claims.
///
/// Returns `AppError::Unauthorized` if the token is malformed, its signature is invalid,
/// it has expired, or it was issued for another purpose.
pub fn verify_token(token: &str) -> Result<Claims, AppError> {
    let claims = decode_claims(token)?;
    if claims.purpose != TokenPurpose::Access {
        return Err(AppError::Unauthorized("Invalid token: wrong purpose".into()));
    }
    Ok(claims)
}

/// Verifies a password-reset token. Any failure is a 400 "Invalid or expired token".
pub fn verify_reset_token(token: &str) -> Result<Claims, AppError> {
    let claims = decode_claims(token).map_err(|e| match e {
        AppError::Unauthorized(_) => AppError::BadRequest("Invalid or expired token".into()),
        other => other,
    })?;
    if claims.purpose != TokenPurpose::PasswordReset {
        return Err(AppError::BadRequest("Invalid or expired token".into()));
    }
    Ok(claims)
}
