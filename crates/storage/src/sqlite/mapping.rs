use prep_core::model::{
    Email, Exam, ExamId, ExamStatus, InstitutionId,
    PomodoroSession, PomodoroSessionId, ProgressStatus, Role, Section, SectionId, Subject,
    SubjectId, Topic, TopicId, User, UserId, UserProgress,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map a query failure: unique violations are conflicts, dangling foreign
/// keys are missing parents, everything else is a connection problem.
pub(crate) fn query_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
        _ => StorageError::Connection(e.to_string()),
    }
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn count_to_u64(v: i64) -> Result<u64, StorageError> {
    i64_to_u64("count", v)
}

pub(crate) fn exam_id_from_i64(v: i64) -> Result<ExamId, StorageError> {
    Ok(ExamId::new(i64_to_u64("exam_id", v)?))
}

pub(crate) fn section_id_from_i64(v: i64) -> Result<SectionId, StorageError> {
    Ok(SectionId::new(i64_to_u64("section_id", v)?))
}

pub(crate) fn subject_id_from_i64(v: i64) -> Result<SubjectId, StorageError> {
    Ok(SubjectId::new(i64_to_u64("subject_id", v)?))
}

pub(crate) fn topic_id_from_i64(v: i64) -> Result<TopicId, StorageError> {
    Ok(TopicId::new(i64_to_u64("topic_id", v)?))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn institution_id_from_i64(v: i64) -> Result<InstitutionId, StorageError> {
    Ok(InstitutionId::new(i64_to_u64("institution_id", v)?))
}

pub(crate) fn pomodoro_id_from_i64(v: i64) -> Result<PomodoroSessionId, StorageError> {
    Ok(PomodoroSessionId::new(i64_to_u64("pomodoro_session_id", v)?))
}

fn order_from_i64(v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization("sort_order overflow".into()))
}

fn optional_institution(row: &SqliteRow) -> Result<Option<InstitutionId>, StorageError> {
    row.try_get::<Option<i64>, _>("institution_id")
        .map_err(ser)?
        .map(institution_id_from_i64)
        .transpose()
}

pub(crate) fn exam_from_row(row: &SqliteRow) -> Result<Exam, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    Ok(Exam {
        id: exam_id_from_i64(row.try_get("id").map_err(ser)?)?,
        name: row.try_get("name").map_err(ser)?,
        code: row.try_get("code").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        status: ExamStatus::parse(&status).map_err(ser)?,
        start_date: row.try_get("start_date").map_err(ser)?,
        end_date: row.try_get("end_date").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn section_from_row(row: &SqliteRow) -> Result<Section, StorageError> {
    Ok(Section {
        id: section_id_from_i64(row.try_get("id").map_err(ser)?)?,
        exam_id: exam_id_from_i64(row.try_get("exam_id").map_err(ser)?)?,
        code: row.try_get("code").map_err(ser)?,
        name: row.try_get("name").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        order: order_from_i64(row.try_get("sort_order").map_err(ser)?)?,
    })
}

pub(crate) fn subject_from_row(row: &SqliteRow) -> Result<Subject, StorageError> {
    Ok(Subject {
        id: subject_id_from_i64(row.try_get("id").map_err(ser)?)?,
        section_id: section_id_from_i64(row.try_get("section_id").map_err(ser)?)?,
        code: row.try_get("code").map_err(ser)?,
        name: row.try_get("name").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        order: order_from_i64(row.try_get("sort_order").map_err(ser)?)?,
    })
}

pub(crate) fn topic_from_row(row: &SqliteRow) -> Result<Topic, StorageError> {
    Ok(Topic {
        id: topic_id_from_i64(row.try_get("id").map_err(ser)?)?,
        subject_id: subject_id_from_i64(row.try_get("subject_id").map_err(ser)?)?,
        code: row.try_get("code").map_err(ser)?,
        name: row.try_get("name").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        order: order_from_i64(row.try_get("sort_order").map_err(ser)?)?,
    })
}

pub(crate) fn user_from_row(row: &SqliteRow) -> Result<User, StorageError> {
    let role: String = row.try_get("role").map_err(ser)?;
    let target_score = row
        .try_get::<Option<i64>, _>("target_score")
        .map_err(ser)?
        .map(|v| u32::try_from(v).map_err(|_| ser("target_score out of range")))
        .transpose()?;
    let daily_study_hours = row
        .try_get::<Option<i64>, _>("daily_study_hours")
        .map_err(ser)?
        .map(|v| u8::try_from(v).map_err(|_| ser("daily_study_hours out of range")))
        .transpose()?;

    Ok(User {
        id: user_id_from_i64(row.try_get("id").map_err(ser)?)?,
        email: Email::from_persisted(row.try_get("email").map_err(ser)?),
        password_hash: row.try_get("password_hash").map_err(ser)?,
        first_name: row.try_get("first_name").map_err(ser)?,
        last_name: row.try_get("last_name").map_err(ser)?,
        role: Role::parse(&role).map_err(ser)?,
        institution_id: optional_institution(row)?,
        target_score,
        daily_study_hours,
        is_active: row.try_get("is_active").map_err(ser)?,
        last_login_at: row.try_get("last_login_at").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn progress_from_row(row: &SqliteRow) -> Result<UserProgress, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    Ok(UserProgress {
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        topic_id: topic_id_from_i64(row.try_get("topic_id").map_err(ser)?)?,
        status: ProgressStatus::parse(&status).map_err(ser)?,
        notes: row.try_get("notes").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn pomodoro_from_row(row: &SqliteRow) -> Result<PomodoroSession, StorageError> {
    let duration: i64 = row.try_get("duration").map_err(ser)?;
    Ok(PomodoroSession {
        id: pomodoro_id_from_i64(row.try_get("id").map_err(ser)?)?,
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        duration: u32::try_from(duration).map_err(|_| ser("duration out of range"))?,
        is_break: row.try_get("is_break").map_err(ser)?,
        completed: row.try_get("completed").map_err(ser)?,
        started_at: row.try_get("started_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}
