use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prep_core::model::{
    AssignmentTarget, AuthSession, Email, Exam, ExamAssignment, ExamId, ExamOutline,
    InstitutionId, NewUser, PomodoroSession, PomodoroSessionId, ProgressStatus, Section,
    SectionId, SessionToken, StudyTotals, Subject, SubjectId, Topic, TopicId, User, UserId,
    UserProgress, ValidatedExam, ValidatedNode,
};
use prep_core::pagination::{Page, Paginated};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── QUERY SHAPES ──────────────────────────────────────────────────────────────
//

/// Which exams a caller may list or count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamVisibility {
    /// Every non-deleted exam.
    All,
    /// Exams with a live assignment to the user or to their institution.
    AssignedTo {
        user_id: UserId,
        institution_id: Option<InstitutionId>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExamTotals {
    pub total: u64,
    pub active: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressFilter {
    pub topic_id: Option<TopicId>,
    pub status: Option<ProgressStatus>,
}

/// How an upsert treats the notes of an existing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotesWrite {
    Replace,
    Keep,
}

//
// ─── TRAITS ────────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait ExamRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when another live exam has the same code.
    async fn insert_exam(&self, exam: &ValidatedExam, now: DateTime<Utc>)
    -> Result<Exam, StorageError>;

    /// Persist every mutable field of `exam`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for missing or deleted exams and
    /// `StorageError::Conflict` on a code collision.
    async fn update_exam(&self, exam: &Exam) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_exam(&self, id: ExamId) -> Result<Option<Exam>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn find_exam_by_code(&self, code: &str) -> Result<Option<Exam>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the exam is missing or already deleted.
    async fn soft_delete_exam(&self, id: ExamId, now: DateTime<Utc>) -> Result<(), StorageError>;

    /// Active, non-deleted exams ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_available_exams(&self) -> Result<Vec<Exam>, StorageError>;

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_visible_exams(
        &self,
        visibility: ExamVisibility,
        page: Page,
    ) -> Result<Paginated<Exam>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn exam_totals(&self, visibility: ExamVisibility) -> Result<ExamTotals, StorageError>;
}

#[async_trait]
pub trait CurriculumRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on a duplicate code within the exam.
    async fn insert_section(
        &self,
        exam_id: ExamId,
        node: &ValidatedNode,
        now: DateTime<Utc>,
    ) -> Result<Section, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on a duplicate code within the section.
    async fn insert_subject(
        &self,
        section_id: SectionId,
        node: &ValidatedNode,
        now: DateTime<Utc>,
    ) -> Result<Subject, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on a duplicate code within the subject.
    async fn insert_topic(
        &self,
        subject_id: SubjectId,
        node: &ValidatedNode,
        now: DateTime<Utc>,
    ) -> Result<Topic, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_section(&self, id: SectionId) -> Result<Option<Section>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_subject(&self, id: SubjectId) -> Result<Option<Subject>, StorageError>;

    /// Live topics only; a topic under a deleted subject or section counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError>;

    /// The live section/subject/topic tree of an exam.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn exam_outline(&self, exam_id: ExamId) -> Result<ExamOutline, StorageError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the email is taken.
    async fn insert_user(&self, user: &NewUser, now: DateTime<Utc>) -> Result<User, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the insert fails.
    async fn insert_institution(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<InstitutionId, StorageError>;
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the exam, user or institution does not exist.
    async fn assign_exam(
        &self,
        exam_id: ExamId,
        target: AssignmentTarget,
        now: DateTime<Utc>,
    ) -> Result<ExamAssignment, StorageError>;

    /// The exam of the user's latest live assignment whose exam is live and
    /// ACTIVE. Ties on `assigned_at` go to the highest assignment id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn active_exam_for_user(&self, user_id: UserId) -> Result<Option<Exam>, StorageError>;

    /// The institution of the exam's earliest live institution assignment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn exam_institution(
        &self,
        exam_id: ExamId,
    ) -> Result<Option<InstitutionId>, StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Insert or update the `(user, topic)` row and return it as stored.
    /// A previously soft-deleted row is revived.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user or topic does not exist.
    async fn upsert_progress(
        &self,
        progress: &UserProgress,
        notes: NotesWrite,
    ) -> Result<UserProgress, StorageError>;

    /// Recorded statuses of the user for the live topics of one exam.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn statuses_for_exam(
        &self,
        user_id: UserId,
        exam_id: ExamId,
    ) -> Result<HashMap<TopicId, ProgressStatus>, StorageError>;

    /// Most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_progress(
        &self,
        user_id: UserId,
        filter: ProgressFilter,
        page: Page,
    ) -> Result<Paginated<UserProgress>, StorageError>;
}

#[async_trait]
pub trait PomodoroRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the insert fails.
    async fn insert_pomodoro(
        &self,
        user_id: UserId,
        duration: u32,
        is_break: bool,
        started_at: DateTime<Utc>,
    ) -> Result<PomodoroSession, StorageError>;

    /// A live session owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_pomodoro(
        &self,
        user_id: UserId,
        id: PomodoroSessionId,
    ) -> Result<Option<PomodoroSession>, StorageError>;

    /// Only a session that is still open is updated.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session vanished or was
    /// already completed.
    async fn save_pomodoro_completion(&self, session: &PomodoroSession)
    -> Result<(), StorageError>;

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_pomodoros(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Paginated<PomodoroSession>, StorageError>;

    /// Completed work sessions started at or after `since` (all time when `None`).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn work_totals(
        &self,
        user_id: UserId,
        since: Option<DateTime<Utc>>,
    ) -> Result<StudyTotals, StorageError>;
}

#[async_trait]
pub trait AuthSessionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the insert fails.
    async fn insert_auth_session(&self, session: &AuthSession) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_auth_session(
        &self,
        token: SessionToken,
    ) -> Result<Option<AuthSession>, StorageError>;

    /// Deleting an unknown token is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn delete_auth_session(&self, token: SessionToken) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn purge_expired_auth_sessions(&self, now: DateTime<Utc>) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Round-trip a trivial query.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` when the store cannot be reached.
    async fn ping(&self) -> Result<(), StorageError>;
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub exams: Arc<dyn ExamRepository>,
    pub curriculum: Arc<dyn CurriculumRepository>,
    pub users: Arc<dyn UserRepository>,
    pub assignments: Arc<dyn AssignmentRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub pomodoros: Arc<dyn PomodoroRepository>,
    pub auth_sessions: Arc<dyn AuthSessionRepository>,
    pub health: Arc<dyn HealthCheck>,
}
