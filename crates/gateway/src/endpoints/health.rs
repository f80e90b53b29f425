//! # GET /health

use axum::Json;
use zvan_types::HealthResponse;

pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
