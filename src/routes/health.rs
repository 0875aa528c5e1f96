use actix_web::HttpResponse;
use chrono::Utc;
use serde_json::json;

/// Liveness probe. Public, and mounted outside `/api`.
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": Utc::now()
    }))
}
