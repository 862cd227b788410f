use crate::metrics;
use crate::state::AppState;
use actix_web::{get, web, HttpResponse};

/// GET /health
#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "sessions": state.registry.session_count().await,
    }))
}

/// GET /metrics
#[get("/metrics")]
pub async fn metrics_endpoint() -> HttpResponse {
    metrics::serve_metrics().await
}
