//! Fixtures shared by the service tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prep_core::model::{
    AssignmentTarget, Email, Exam, ExamAssignment, ExamDraft, ExamId, InstitutionId, NewUser, ProgressStatus, Role, TopicId, User,
    UserId, UserProgress,
};
use prep_core::pagination::{Page, Paginated};
use prep_core::time::fixed_now;
use storage::repository::{
    AssignmentRepository, NotesWrite, ProgressFilter, ProgressRepository, Storage, StorageError, UserRepository,
};

/// A migrated, private in-memory database.
pub async fn storage(name: &str) -> Storage {
    Storage::sqlite(&format!(
        "sqlite:file:memdb_services_{name}?mode=memory&cache=shared"
    ))
    .await
    .expect("in-memory storage")
}

pub async fn user(
    storage: &Storage,
    email: &str,
    role: Role,
    institution_id: Option<InstitutionId>,
) -> User {
    let new_user = NewUser {
        email: Email::parse(email).expect("valid email"),
        password_hash: "$argon2id$unused".into(),
        first_name: "Test".into(),
        last_name: "User".into(),
        role,
        institution_id,
        target_score: Some(75),
        daily_study_hours: Some(3),
    };
    storage
        .users
        .insert_user(&new_user, fixed_now())
        .await
        .expect("insert user")
}

pub async fn exam(storage: &Storage, code: &str) -> Exam {
    let draft = ExamDraft {
        name: format!("{code} exam"),
        code: code.into(),
        ..ExamDraft::default()
    };
    storage
        .exams
        .insert_exam(&draft.validate().expect("valid exam"), fixed_now())
        .await
        .expect("insert exam")
}

fn down() -> StorageError {
    StorageError::Connection("database is down".into())
}

pub struct FailingUsers;

#[async_trait]
impl UserRepository for FailingUsers {
    async fn insert_user(&self, _: &NewUser, _: DateTime<Utc>) -> Result<User, StorageError> {
        Err(down())
    }

    async fn get_user(&self, _: UserId) -> Result<Option<User>, StorageError> {
        Err(down())
    }

    async fn find_user_by_email(&self, _: &Email) -> Result<Option<User>, StorageError> {
        Err(down())
    }

    async fn record_login(&self, _: UserId, _: DateTime<Utc>) -> Result<(), StorageError> {
        Err(down())
    }

    async fn insert_institution(
        &self,
        _: &str,
        _: DateTime<Utc>,
    ) -> Result<InstitutionId, StorageError> {
        Err(down())
    }
}

pub struct FailingAssignments;

#[async_trait]
impl AssignmentRepository for FailingAssignments {
    async fn assign_exam(
        &self,
        _: ExamId,
        _: AssignmentTarget,
        _: DateTime<Utc>,
    ) -> Result<ExamAssignment, StorageError> {
        Err(down())
    }

    async fn active_exam_for_user(&self, _: UserId) -> Result<Option<Exam>, StorageError> {
        Err(down())
    }

    async fn exam_institution(&self, _: ExamId) -> Result<Option<InstitutionId>, StorageError> {
        Err(down())
    }
}

pub struct FailingProgress;

#[async_trait]
impl ProgressRepository for FailingProgress {
    async fn upsert_progress(
        &self,
        _: &UserProgress,
        _: NotesWrite,
    ) -> Result<UserProgress, StorageError> {
        Err(down())
    }

    async fn statuses_for_exam(
        &self,
        _: UserId,
        _: ExamId,
    ) -> Result<HashMap<TopicId, ProgressStatus>, StorageError> {
        Err(down())
    }

    async fn list_progress(
        &self,
        _: UserId,
        _: ProgressFilter,
        _: Page,
    ) -> Result<Paginated<UserProgress>, StorageError> {
        Err(down())
    }
}
