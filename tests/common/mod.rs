#![allow(dead_code)]

use actix_http::Request;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{test, web, App};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use taskmanager::configure_app;
use taskmanager::error::AppError;
use taskmanager::notifications::{Delivery, EmailMessage, EmailService, Mailer};

pub const FRONTEND_URL: &str = "http://localhost:5173/";
pub const PASSWORD: &str = "Password123!";

pub fn ensure_jwt_secret() {
    if std::env::var("JWT_SECRET").is_err() {
        std::env::set_var("JWT_SECRET", "integration-test-secret");
    }
}

/// Migrated pool for `DATABASE_URL`, or `None` (and the test is skipped) when it is unset.
pub async fn test_pool() -> Option<PgPool> {
    dotenv::dotenv().ok();
    ensure_jwt_secret();

    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping database test");
        return None;
    };
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test DB");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    Some(pool)
}

/// Keeps every message instead of sending it.
#[derive(Default)]
pub struct CapturingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl CapturingMailer {
    pub fn sent_to(&self, address: &str) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|message| message.to == address)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, message: EmailMessage) -> Result<Delivery, AppError> {
        self.sent.lock().unwrap().push(message);
        Ok(Delivery {
            message_id: format!("<{}@test.local>", Uuid::new_v4()),
        })
    }
}

pub fn capturing_email() -> (Arc<CapturingMailer>, EmailService) {
    let mailer = Arc::new(CapturingMailer::default());
    let service = EmailService::new(mailer.clone(), FRONTEND_URL);
    (mailer, service)
}

pub async fn init_app(
    pool: PgPool,
    email: EmailService,
) -> impl Service<Request, Response = ServiceResponse, Error = actix_web::Error> {
    test::init_service(
        App::new()
            .app_data(web::Data::new(pool))
            .app_data(web::Data::new(email))
            .configure(configure_app),
    )
    .await
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, Uuid::new_v4().simple())
}

/// Registers a fresh account and returns its token and id.
pub async fn register_user(
    app: &impl Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
    email: &str,
) -> (String, i64) {
    let req = test::TestRequest::post()
        .uri("/api/users/register")
        .set_json(json!({ "name": "Integration User", "email": email, "password": PASSWORD }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    let token = body["token"].as_str().expect("token in response").to_string();
    let user_id = body["user"]["id"].as_i64().expect("user id in response");
    (token, user_id)
}

/// Inserts a task directly so `due_date` and `updated_at` can sit exactly on a window edge.
pub async fn insert_task(
    pool: &PgPool,
    user_id: i64,
    title: &str,
    due_date: DateTime<Utc>,
    completed: bool,
    updated_at: DateTime<Utc>,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO tasks (id, title, due_date, completed, user_id, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(id)
    .bind(title)
    .bind(due_date)
    .bind(completed)
    .bind(user_id as i32)
    .bind(updated_at)
    .bind(updated_at)
    .execute(pool)
    .await
    .expect("Failed to insert task");
    id
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

pub async fn cleanup_user(pool: &PgPool, email: &str) {
    let _ = sqlx::query("DELETE FROM users WHERE email = $1")
        .bind(email)
        .execute(pool)
        .await;
}
