//! Shared error types for the services crate.

use thiserror::Error;

use prep_core::model::{
    AssignmentError, CurriculumError, ExamError, PomodoroError, ProgressError, ProgressStatus,
    UserError,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `AuthService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("account is disabled")]
    Inactive,
    #[error("email is already registered")]
    EmailTaken,
    #[error("not authenticated")]
    Unauthenticated,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Validation(#[from] prep_core::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<UserError> for AuthError {
    fn from(err: UserError) -> Self {
        Self::Validation(err.into())
    }
}

/// Errors emitted by `ExamService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamServiceError {
    #[error("insufficient permissions")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error(transparent)]
    Validation(#[from] prep_core::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ExamError> for ExamServiceError {
    fn from(err: ExamError) -> Self {
        Self::Validation(err.into())
    }
}

impl From<CurriculumError> for ExamServiceError {
    fn from(err: CurriculumError) -> Self {
        Self::Validation(err.into())
    }
}

impl From<AssignmentError> for ExamServiceError {
    fn from(err: AssignmentError) -> Self {
        Self::Validation(err.into())
    }
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("topic not found")]
    TopicNotFound,
    #[error("status {} cannot be set here", .0.as_str())]
    StatusNotAllowed(ProgressStatus),
    #[error(transparent)]
    Validation(#[from] prep_core::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ProgressError> for ProgressServiceError {
    fn from(err: ProgressError) -> Self {
        Self::Validation(err.into())
    }
}

/// Errors emitted by `PomodoroService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PomodoroServiceError {
    #[error("pomodoro session not found")]
    NotFound,
    #[error("pomodoro session already completed")]
    AlreadyCompleted,
    #[error(transparent)]
    Validation(#[from] prep_core::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<PomodoroError> for PomodoroServiceError {
    fn from(err: PomodoroError) -> Self {
        match err {
            PomodoroError::AlreadyCompleted => Self::AlreadyCompleted,
            other => Self::Validation(other.into()),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}
