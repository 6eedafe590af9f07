mod assignment;
mod auth;
mod curriculum;
mod exam;
mod ids;
mod pomodoro;
mod progress;
mod user;
pub mod validation;

pub use ids::{
    AssignmentId, ExamId, InstitutionId, ParseIdError, PomodoroSessionId, SectionId, SubjectId,
    TopicId, UserId,
};

pub use assignment::{AssignmentDraft, AssignmentError, AssignmentTarget, ExamAssignment};
pub use auth::{AuthSession, DEFAULT_SESSION_TTL_DAYS, SessionToken};
pub use curriculum::{
    CurriculumError, ExamOutline, NodeDraft, Section, SectionOutline, Subject, SubjectOutline,
    Topic, ValidatedNode,
};
pub use exam::{
    Exam, ExamDraft, ExamError, ExamPatch, ExamStatus, ExamSummary, ScoreRange, ValidatedExam,
};
pub use pomodoro::{
    DEFAULT_POMODORO_MINUTES, PomodoroDraft, PomodoroError, PomodoroSession, StudyTotals,
};
pub use progress::{ProgressError, ProgressStatus, UserProgress};
pub use user::{
    CurrentUser, Email, NewUser, RegistrationDraft, Role, User, UserError,
    ValidatedRegistration, check_password_policy,
};
pub use validation::ValidationError;
