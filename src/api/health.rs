use axum::{routing::get, Json, Router};
use serde::Serialize;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Plain HTTP router served next to the gRPC endpoint for liveness probes
pub fn create_router() -> Router {
    Router::new().route("/health", get(health_check))
}
