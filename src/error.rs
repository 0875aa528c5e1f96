//! Application error type.
//!
//! Handlers, the email service and the reminder scheduler all fail with [`AppError`].
//! Through `ResponseError` each variant maps to a status code and a
//! `{"error": "..."}` body. Database and SMTP details are logged, never returned.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

#[derive(Debug)]
pub enum AppError {
    /// Missing, malformed or expired credentials (HTTP 401).
    Unauthorized(String),
    /// The request is well-formed JSON but cannot be honoured (HTTP 400).
    BadRequest(String),
    /// No such resource, or it belongs to another user (HTTP 404).
    NotFound(String),
    InternalServerError(String),
    /// A `sqlx` failure (HTTP 500).
    DatabaseError(String),
    /// Field-level validation failed (HTTP 422).
    ValidationError(String),
    /// Building or delivering an email failed (HTTP 500).
    EmailError(String),
}

impl AppError {
    fn message(&self) -> &str {
        match self {
            AppError::Unauthorized(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::InternalServerError(msg)
            | AppError::DatabaseError(msg)
            | AppError::ValidationError(msg)
            | AppError::EmailError(msg) => msg,
        }
    }

    /// What the client sees in the `error` field.
    fn public_message(&self) -> &str {
        match self {
            AppError::DatabaseError(_) => "Database error",
            AppError::EmailError(_) => "Failed to send email",
            other => other.message(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self {
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::BadRequest(_) => "Bad Request",
            AppError::NotFound(_) => "Not Found",
            AppError::InternalServerError(_) => "Internal Server Error",
            AppError::DatabaseError(_) => "Database Error",
            AppError::ValidationError(_) => "Validation Error",
            AppError::EmailError(_) => "Email Error",
        };
        write!(f, "{}: {}", kind, self.message())
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) | AppError::EmailError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if matches!(self, AppError::DatabaseError(_) | AppError::EmailError(_)) {
            log::error!("{}", self);
        }
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.public_message()
        }))
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl AppError {
    /// For `map_err` on inserts and updates guarded by a unique constraint: a
    /// violation becomes `BadRequest(message)`, anything else converts as usual.
    pub fn on_conflict(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
        move |error| {
            if is_unique_violation(&error) {
                AppError::BadRequest(message.into())
            } else {
                error.into()
            }
        }
    }
}

/// `RowNotFound` becomes a 404 and a unique violation a 400; every other `sqlx`
/// failure is a `DatabaseError`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        if is_unique_violation(&error) {
            return AppError::BadRequest("Resource already exists".into());
        }
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(error.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(error: lettre::error::Error) -> AppError {
        AppError::EmailError(format!("Failed to build message: {}", error))
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(error: lettre::address::AddressError) -> AppError {
        AppError::EmailError(format!("Invalid address: {}", error))
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(error: lettre::transport::smtp::Error) -> AppError {
        AppError::EmailError(format!("SMTP delivery failed: {}", error))
    }
}

/// Maps JSON body extraction failures (missing fields, wrong types) to a 400
/// with the usual `{"error": ...}` body.
pub fn json_error_handler(
    err: actix_web::error::JsonPayloadError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid request body: {}", err)).into()
}
