use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::token::Claims;
use crate::error::AppError;

/// Extracts the authenticated user's ID from request extensions.
///
/// Intended for routes protected by `AuthMiddleware`, which validates the JWT and
/// inserts its [`Claims`]. If no claims are present the extractor fails with
/// `AppError::Unauthorized`.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUserId(pub i32);

impl FromRequest for AuthenticatedUserId {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user_id = req
            .extensions()
            .get::<Claims>()
            .map(|claims| AuthenticatedUserId(claims.sub))
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()).into());
        ready(user_id)
    }
}
