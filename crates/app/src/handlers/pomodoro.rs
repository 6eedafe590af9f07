use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use prep_core::model::{PomodoroDraft, PomodoroSessionId};
use prep_core::pagination::PageQuery;

use crate::AppState;
use crate::error::AppError;
use crate::extractors::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::response::ApiResponse;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pomodoro", get(history).post(start))
        .route("/pomodoro/{session_id}", patch(complete))
}

async fn history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let history = state
        .services
        .pomodoros()
        .history(user.id, query.into())
        .await?;
    Ok(ApiResponse::ok(history))
}

async fn start(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(draft): ApiJson<PomodoroDraft>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.services.pomodoros().start(user.id, draft).await?;
    Ok(ApiResponse::created(session))
}

async fn complete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(session_id): ApiPath<PomodoroSessionId>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .services
        .pomodoros()
        .complete(user.id, session_id)
        .await?;
    Ok(ApiResponse::ok(session))
}
