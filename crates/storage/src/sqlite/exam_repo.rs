use chrono::{DateTime, Utc};
use prep_core::model::{Exam, ExamId, ExamStatus, ValidatedExam};
use prep_core::pagination::{Page, Paginated};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{count_to_u64, exam_from_row, exam_id_from_i64, id_to_i64, query_err, ser};
use crate::repository::{ExamRepository, ExamTotals, ExamVisibility, StorageError};

const EXAM_COLUMNS: &str =
    "id, name, code, description, status, start_date, end_date, created_at, updated_at";

/// Shared visibility predicate over an `exams e` alias.
///
/// `?1` selects "all exams", `?2`/`?3` are the viewer's user and institution.
const VISIBLE: &str = r"
    e.deleted_at IS NULL
    AND (
        ?1 = 1
        OR EXISTS (
            SELECT 1 FROM exam_assignments a
            WHERE a.exam_id = e.id
              AND a.deleted_at IS NULL
              AND (a.user_id = ?2 OR (?3 IS NOT NULL AND a.institution_id = ?3))
        )
    )
";

fn visibility_binds(visibility: ExamVisibility) -> Result<(bool, i64, Option<i64>), StorageError> {
    match visibility {
        ExamVisibility::All => Ok((true, 0, None)),
        ExamVisibility::AssignedTo {
            user_id,
            institution_id,
        } => Ok((
            false,
            id_to_i64("user_id", user_id.value())?,
            institution_id
                .map(|i| id_to_i64("institution_id", i.value()))
                .transpose()?,
        )),
    }
}

#[async_trait::async_trait]
impl ExamRepository for SqliteRepository {
    async fn insert_exam(
        &self,
        exam: &ValidatedExam,
        now: DateTime<Utc>,
    ) -> Result<Exam, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO exams (name, code, description, status, start_date, end_date, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ",
        )
        .bind(&exam.name)
        .bind(&exam.code)
        .bind(&exam.description)
        .bind(exam.status.as_str())
        .bind(exam.start_date)
        .bind(exam.end_date)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(Exam {
            id: exam_id_from_i64(res.last_insert_rowid())?,
            name: exam.name.clone(),
            code: exam.code.clone(),
            description: exam.description.clone(),
            status: exam.status,
            start_date: exam.start_date,
            end_date: exam.end_date,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_exam(&self, exam: &Exam) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE exams
            SET name = ?2, code = ?3, description = ?4, status = ?5,
                start_date = ?6, end_date = ?7, updated_at = ?8
            WHERE id = ?1 AND deleted_at IS NULL
            ",
        )
        .bind(id_to_i64("exam_id", exam.id.value())?)
        .bind(&exam.name)
        .bind(&exam.code)
        .bind(&exam.description)
        .bind(exam.status.as_str())
        .bind(exam.start_date)
        .bind(exam.end_date)
        .bind(exam.updated_at)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_exam(&self, id: ExamId) -> Result<Option<Exam>, StorageError> {
        let sql = format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = ?1 AND deleted_at IS NULL");
        let row = sqlx::query(&sql)
            .bind(id_to_i64("exam_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(exam_from_row).transpose()
    }

    async fn find_exam_by_code(&self, code: &str) -> Result<Option<Exam>, StorageError> {
        let sql =
            format!("SELECT {EXAM_COLUMNS} FROM exams WHERE code = ?1 AND deleted_at IS NULL");
        let row = sqlx::query(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(exam_from_row).transpose()
    }

    async fn soft_delete_exam(&self, id: ExamId, now: DateTime<Utc>) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE exams SET deleted_at = ?2, updated_at = ?2
            WHERE id = ?1 AND deleted_at IS NULL
            ",
        )
        .bind(id_to_i64("exam_id", id.value())?)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn list_available_exams(&self) -> Result<Vec<Exam>, StorageError> {
        let sql = format!(
            "SELECT {EXAM_COLUMNS} FROM exams
             WHERE status = ?1 AND deleted_at IS NULL
             ORDER BY name ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(ExamStatus::Active.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;
        rows.iter().map(exam_from_row).collect()
    }

    async fn list_visible_exams(
        &self,
        visibility: ExamVisibility,
        page: Page,
    ) -> Result<Paginated<Exam>, StorageError> {
        let (all, user_id, institution_id) = visibility_binds(visibility)?;

        let total_sql = format!("SELECT COUNT(*) AS n FROM exams e WHERE {VISIBLE}");
        let total: i64 = sqlx::query(&total_sql)
            .bind(all)
            .bind(user_id)
            .bind(institution_id)
            .fetch_one(&self.pool)
            .await
            .map_err(query_err)?
            .try_get("n")
            .map_err(ser)?;

        let sql = format!(
            "SELECT {EXAM_COLUMNS} FROM exams e
             WHERE {VISIBLE}
             ORDER BY e.created_at DESC, e.id DESC
             LIMIT ?4 OFFSET ?5"
        );
        let rows = sqlx::query(&sql)
            .bind(all)
            .bind(user_id)
            .bind(institution_id)
            .bind(id_to_i64("limit", page.limit())?)
            .bind(id_to_i64("offset", page.offset())?)
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;

        let items = rows.iter().map(exam_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Paginated::new(items, page, count_to_u64(total)?))
    }

    async fn exam_totals(&self, visibility: ExamVisibility) -> Result<ExamTotals, StorageError> {
        let (all, user_id, institution_id) = visibility_binds(visibility)?;
        let sql = format!(
            "SELECT COUNT(*) AS total,
                    COALESCE(SUM(CASE WHEN e.status = ?4 THEN 1 ELSE 0 END), 0) AS active
             FROM exams e
             WHERE {VISIBLE}"
        );
        let row = sqlx::query(&sql)
            .bind(all)
            .bind(user_id)
            .bind(institution_id)
            .bind(ExamStatus::Active.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(query_err)?;

        Ok(ExamTotals {
            total: count_to_u64(row.try_get("total").map_err(ser)?)?,
            active: count_to_u64(row.try_get("active").map_err(ser)?)?,
        })
    }
}
