//! HTTP error mapping.
//!
//! Every failure leaves as `{ success: false, error: { message, code }, timestamp }`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use services::{
    AuthError, ExamServiceError, PomodoroServiceError, ProgressServiceError,
};
use storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication required")]
    Unauthorized,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("insufficient permissions")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("too many requests, please try again later")]
    RateLimited,
    #[error("service temporarily unavailable")]
    StoreUnavailable(String),
    #[error("internal server error")]
    Internal(String),
}

impl AppError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::RateLimited => "RATE_LIMIT_EXCEEDED",
            AppError::StoreUnavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// JSON body shared by error responses, including ones built outside `AppError`.
#[must_use]
pub fn error_body(message: &str, code: &str) -> serde_json::Value {
    json!({
        "success": false,
        "error": { "message": message, "code": code },
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Internal(detail) => tracing::error!(%detail, "internal error"),
            AppError::StoreUnavailable(detail) => tracing::warn!(%detail, "store unavailable"),
            _ => {}
        }
        let body = error_body(&self.to_string(), self.code());
        (self.status(), Json(body)).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => AppError::NotFound("resource not found".into()),
            StorageError::Conflict => AppError::Conflict("resource already exists".into()),
            StorageError::Connection(detail) => AppError::StoreUnavailable(detail),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<prep_core::Error> for AppError {
    fn from(err: prep_core::Error) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::InvalidCredentials,
            AuthError::Inactive => AppError::Forbidden,
            AuthError::EmailTaken => AppError::Conflict(err.to_string()),
            AuthError::Unauthenticated => AppError::Unauthorized,
            AuthError::Validation(inner) => inner.into(),
            AuthError::Storage(inner) => inner.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<ExamServiceError> for AppError {
    fn from(err: ExamServiceError) -> Self {
        match err {
            ExamServiceError::Forbidden => AppError::Forbidden,
            ExamServiceError::NotFound(_) => AppError::NotFound(err.to_string()),
            ExamServiceError::Conflict(_) => AppError::Conflict(err.to_string()),
            ExamServiceError::Validation(inner) => inner.into(),
            ExamServiceError::Storage(inner) => inner.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<ProgressServiceError> for AppError {
    fn from(err: ProgressServiceError) -> Self {
        match err {
            ProgressServiceError::TopicNotFound => AppError::NotFound(err.to_string()),
            ProgressServiceError::StatusNotAllowed(_) => AppError::Validation(err.to_string()),
            ProgressServiceError::Validation(inner) => inner.into(),
            ProgressServiceError::Storage(inner) => inner.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<PomodoroServiceError> for AppError {
    fn from(err: PomodoroServiceError) -> Self {
        match err {
            PomodoroServiceError::NotFound => AppError::NotFound(err.to_string()),
            PomodoroServiceError::AlreadyCompleted => AppError::BadRequest(err.to_string()),
            PomodoroServiceError::Validation(inner) => inner.into(),
            PomodoroServiceError::Storage(inner) => inner.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_errors_are_transient() {
        let err: AppError = StorageError::Connection("pool timed out".into()).into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "service temporarily unavailable");
    }

    #[test]
    fn service_errors_map_to_statuses() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (AuthError::EmailTaken.into(), StatusCode::CONFLICT),
            (AuthError::Unauthenticated.into(), StatusCode::UNAUTHORIZED),
            (ExamServiceError::Forbidden.into(), StatusCode::FORBIDDEN),
            (ExamServiceError::NotFound("exam").into(), StatusCode::NOT_FOUND),
            (ProgressServiceError::TopicNotFound.into(), StatusCode::NOT_FOUND),
            (PomodoroServiceError::AlreadyCompleted.into(), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }

    #[test]
    fn body_has_envelope_shape() {
        let body = error_body("nope", "NOT_FOUND");
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert!(body["timestamp"].is_string());
    }
}
