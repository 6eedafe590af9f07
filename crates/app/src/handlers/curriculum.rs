use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use prep_core::model::{ExamId, NodeDraft, SectionId, SubjectId};
use serde::Deserialize;

use crate::AppState;
use crate::error::AppError;
use crate::extractors::{ApiJson, ApiQuery, AuthUser};
use crate::response::ApiResponse;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sections", post(create_section))
        .route("/subjects", get(list_subjects).post(create_subject))
        .route("/topics", post(create_topic))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubjectsQuery {
    exam_id: ExamId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewSection {
    exam_id: ExamId,
    #[serde(flatten)]
    node: NodeDraft,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewSubject {
    section_id: SectionId,
    #[serde(flatten)]
    node: NodeDraft,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewTopic {
    subject_id: SubjectId,
    #[serde(flatten)]
    node: NodeDraft,
}

async fn list_subjects(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<SubjectsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let subjects = state
        .services
        .exams()
        .list_subjects(&user, query.exam_id)
        .await?;
    Ok(ApiResponse::ok(subjects))
}

async fn create_section(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<NewSection>,
) -> Result<impl IntoResponse, AppError> {
    let section = state
        .services
        .exams()
        .create_section(&user, body.exam_id, body.node)
        .await?;
    Ok(ApiResponse::created(section))
}

async fn create_subject(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<NewSubject>,
) -> Result<impl IntoResponse, AppError> {
    let subject = state
        .services
        .exams()
        .create_subject(&user, body.section_id, body.node)
        .await?;
    Ok(ApiResponse::created(subject))
}

async fn create_topic(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<NewTopic>,
) -> Result<impl IntoResponse, AppError> {
    let topic = state
        .services
        .exams()
        .create_topic(&user, body.subject_id, body.node)
        .await?;
    Ok(ApiResponse::created(topic))
}
