use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use prep_core::model::{ProgressStatus, TopicId};
use prep_core::pagination::Page;
use serde::Deserialize;
use services::ProgressUpdate;
use storage::repository::ProgressFilter;

use crate::AppState;
use crate::error::AppError;
use crate::extractors::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::response::ApiResponse;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/progress", get(list_progress).post(record_progress))
        .route("/progress/{topic_id}", patch(set_status))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressQuery {
    page: Option<u32>,
    #[serde(alias = "pageSize")]
    limit: Option<u32>,
    topic_id: Option<TopicId>,
    status: Option<ProgressStatus>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: ProgressStatus,
}

async fn list_progress(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<ProgressQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = ProgressFilter {
        topic_id: query.topic_id,
        status: query.status,
    };
    let rows = state
        .services
        .progress()
        .list_progress(user.id, filter, Page::new(query.page, query.limit))
        .await?;
    Ok(ApiResponse::paginated(rows))
}

async fn record_progress(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(update): ApiJson<ProgressUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let row = state
        .services
        .progress()
        .record_progress(user.id, update)
        .await?;
    Ok(ApiResponse::ok(row))
}

async fn set_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(topic_id): ApiPath<TopicId>,
    ApiJson(body): ApiJson<StatusBody>,
) -> Result<impl IntoResponse, AppError> {
    let row = state
        .services
        .progress()
        .set_topic_status(user.id, topic_id, body.status)
        .await?;
    Ok(ApiResponse::ok(row))
}
