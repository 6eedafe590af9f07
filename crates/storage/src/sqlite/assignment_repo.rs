use chrono::{DateTime, Utc};
use prep_core::model::{
    AssignmentId, AssignmentTarget, Exam, ExamAssignment, ExamId, ExamStatus, InstitutionId,
    UserId,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    exam_from_row, id_to_i64, institution_id_from_i64, query_err, ser,
};
use crate::repository::{AssignmentRepository, StorageError};

#[async_trait::async_trait]
impl AssignmentRepository for SqliteRepository {
    async fn assign_exam(
        &self,
        exam_id: ExamId,
        target: AssignmentTarget,
        now: DateTime<Utc>,
    ) -> Result<ExamAssignment, StorageError> {
        let user = target
            .user_id()
            .map(|u| id_to_i64("user_id", u.value()))
            .transpose()?;
        let institution = target
            .institution_id()
            .map(|i| id_to_i64("institution_id", i.value()))
            .transpose()?;

        let res = sqlx::query(
            r"
            INSERT INTO exam_assignments (exam_id, user_id, institution_id, assigned_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(id_to_i64("exam_id", exam_id.value())?)
        .bind(user)
        .bind(institution)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| ser("assignment_id sign overflow"))?;
        Ok(ExamAssignment {
            id: AssignmentId::new(id),
            exam_id,
            user_id: target.user_id(),
            institution_id: target.institution_id(),
            assigned_at: now,
        })
    }

    async fn active_exam_for_user(&self, user_id: UserId) -> Result<Option<Exam>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT e.id, e.name, e.code, e.description, e.status, e.start_date, e.end_date,
                   e.created_at, e.updated_at
            FROM exam_assignments a
            JOIN exams e ON e.id = a.exam_id
            WHERE a.user_id = ?1
              AND a.deleted_at IS NULL
              AND e.deleted_at IS NULL
              AND e.status = ?2
            ORDER BY a.assigned_at DESC, a.id DESC
            LIMIT 1
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(ExamStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;
        row.as_ref().map(exam_from_row).transpose()
    }

    async fn exam_institution(
        &self,
        exam_id: ExamId,
    ) -> Result<Option<InstitutionId>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT institution_id
            FROM exam_assignments
            WHERE exam_id = ?1 AND institution_id IS NOT NULL AND deleted_at IS NULL
            ORDER BY assigned_at ASC, id ASC
            LIMIT 1
            ",
        )
        .bind(id_to_i64("exam_id", exam_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        match row {
            Some(row) => {
                let id: i64 = row.try_get("institution_id").map_err(ser)?;
                institution_id_from_i64(id).map(Some)
            }
            None => Ok(None),
        }
    }
}
