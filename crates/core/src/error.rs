use thiserror::Error;

use crate::model::{
    AssignmentError, CurriculumError, ExamError, PomodoroError, ProgressError, UserError,
    ValidationError,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Curriculum(#[from] CurriculumError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Pomodoro(#[from] PomodoroError),
}
