use axum::Json;
use voicedate_shared::types::api::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("voicedate-messaging", env!("CARGO_PKG_VERSION")))
}
