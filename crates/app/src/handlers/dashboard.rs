use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;

use crate::AppState;
use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::response::ApiResponse;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/stats", get(stats))
        .route("/dashboard/detail", get(detail))
}

async fn stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let stats = state.services.progress().dashboard_stats(&user).await?;
    Ok(ApiResponse::ok(stats))
}

/// Section, subject and topic breakdown for the active exam.
async fn detail(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let report = state.services.progress().detail_report(user.id).await?;
    tracing::debug!(user_id = %user.id, "built progress report");
    Ok(ApiResponse::ok(report))
}
