#![doc = "The `taskmanager` library crate."]
#![doc = ""]
#![doc = "Domain models, authentication, the HTTP routes, and the email notification"]
#![doc = "pipeline (due-date windows, templates, delivery and the reminder scheduler)."]
#![doc = "The binary (`main.rs`) loads configuration, opens the database pool and"]
#![doc = "mounts everything here with [`configure_app`]."]

pub mod auth;
pub mod config;
pub mod dates;
pub mod error;
pub mod models;
pub mod notifications;
pub mod routes;

use actix_web::web;

use crate::auth::AuthMiddleware;
use crate::error::json_error_handler;

/// Mounts `/health` and the authenticated `/api` scope. Expects a
/// `web::Data<PgPool>` and a `web::Data<EmailService>` on the app.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .route("/health", web::get().to(routes::health::health))
        .service(
            web::scope("/api")
                .wrap(AuthMiddleware)
                .configure(routes::config),
        );
}
