use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::SecondsFormat;
use serde_json::json;

use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Liveness plus a store round-trip. Not wrapped in the success envelope.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = state
        .services
        .clock()
        .now()
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    match state.services.health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "timestamp": timestamp,
                "database": "connected",
            })),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "timestamp": timestamp,
                    "database": "disconnected",
                })),
            )
        }
    }
}
