//! bcrypt hashing, run on the blocking thread pool so a login does not stall
//! the worker's event loop.

use actix_web::web;
use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::AppError;

async fn run_blocking<T, F>(what: &'static str, job: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, bcrypt::BcryptError> + Send + 'static,
    T: Send + 'static,
{
    web::block(job)
        .await
        .map_err(|e| AppError::InternalServerError(format!("{} task was cancelled: {}", what, e)))?
        .map_err(|e| AppError::InternalServerError(format!("Failed to {} password: {}", what, e)))
}

pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_owned();
    run_blocking("hash", move || hash(password, DEFAULT_COST)).await
}

/// `Ok(false)` for a wrong password; an error only when `hashed` is not a bcrypt hash.
pub async fn verify_password(password: &str, hashed: &str) -> Result<bool, AppError> {
    let (password, hashed) = (password.to_owned(), hashed.to_owned());
    run_blocking("verify", move || verify(password, &hashed)).await
}
