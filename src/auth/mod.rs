//! Authentication: JWT issuing and checking, bcrypt password hashing, the
//! `/api` guard middleware and the request bodies of the account endpoints.

pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::User;

pub use extractors::AuthenticatedUserId;
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use token::{generate_reset_token, generate_token, verify_reset_token, verify_token, Claims};

/// Body of `POST /api/users/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Body of `POST /api/users/register`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(deserialize_with = "crate::models::user::trimmed")]
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    /// At least 6 characters.
    #[validate(length(min = 6))]
    pub password: String,
}

/// Body of `POST /api/users/forgot-password`.
#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

/// Body of `PUT /api/users/reset-password`.
#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    #[validate(length(min = 6))]
    pub password: String,
}

/// Returned by register and login: a 30-day access token and the account it belongs to.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}
