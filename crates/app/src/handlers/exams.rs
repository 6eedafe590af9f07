use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use prep_core::model::{AssignmentDraft, ExamDraft, ExamId, ExamPatch};
use prep_core::pagination::PageQuery;
use serde::Serialize;

use crate::AppState;
use crate::error::AppError;
use crate::extractors::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::response::ApiResponse;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/exams/available", get(available_exams))
        .route("/exams", get(list_exams).post(create_exam))
        .route(
            "/exams/{id}",
            get(get_exam).put(update_exam).delete(delete_exam),
        )
        .route("/exams/{id}/assignments", post(assign_exam))
}

#[derive(Debug, Serialize)]
struct Deleted {
    message: &'static str,
}

/// Public: the exams a new user may pick at registration.
async fn available_exams(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let exams = state.services.exams().available_exams().await?;
    Ok(ApiResponse::ok(exams))
}

async fn list_exams(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = state
        .services
        .exams()
        .list_exams(&user, query.into())
        .await?;
    Ok(ApiResponse::paginated(page))
}

async fn get_exam(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<ExamId>,
) -> Result<impl IntoResponse, AppError> {
    let exam = state.services.exams().get_exam(&user, id).await?;
    Ok(ApiResponse::ok(exam))
}

async fn create_exam(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(draft): ApiJson<ExamDraft>,
) -> Result<impl IntoResponse, AppError> {
    let exam = state.services.exams().create_exam(&user, draft).await?;
    Ok(ApiResponse::created(exam))
}

async fn update_exam(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<ExamId>,
    ApiJson(patch): ApiJson<ExamPatch>,
) -> Result<impl IntoResponse, AppError> {
    let exam = state.services.exams().update_exam(&user, id, patch).await?;
    Ok(ApiResponse::ok(exam))
}

async fn delete_exam(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<ExamId>,
) -> Result<impl IntoResponse, AppError> {
    state.services.exams().delete_exam(&user, id).await?;
    Ok(ApiResponse::ok(Deleted {
        message: "exam deleted",
    }))
}

async fn assign_exam(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<ExamId>,
    ApiJson(draft): ApiJson<AssignmentDraft>,
) -> Result<impl IntoResponse, AppError> {
    let assignment = state.services.exams().assign_exam(&user, id, draft).await?;
    Ok(ApiResponse::created(assignment))
}
