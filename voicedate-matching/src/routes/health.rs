use axum::Json;
use voicedate_shared::types::api::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("voicedate-matching", env!("CARGO_PKG_VERSION")))
}
