use std::collections::HashMap;

use prep_core::model::{ExamId, ProgressStatus, TopicId, UserId, UserProgress};
use prep_core::pagination::{Page, Paginated};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    count_to_u64, id_to_i64, progress_from_row, query_err, ser, topic_id_from_i64,
};
use crate::repository::{NotesWrite, ProgressFilter, ProgressRepository, StorageError};

const PROGRESS_COLUMNS: &str = "user_id, topic_id, status, notes, completed_at, updated_at";

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn upsert_progress(
        &self,
        progress: &UserProgress,
        notes: NotesWrite,
    ) -> Result<UserProgress, StorageError> {
        let user = id_to_i64("user_id", progress.user_id.value())?;
        let topic = id_to_i64("topic_id", progress.topic_id.value())?;

        sqlx::query(
            r"
            INSERT INTO user_progress (user_id, topic_id, status, notes, completed_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id, topic_id) DO UPDATE SET
                status = excluded.status,
                notes = CASE
                    WHEN ?7 = 1 OR user_progress.deleted_at IS NOT NULL THEN excluded.notes
                    ELSE user_progress.notes
                END,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at,
                deleted_at = NULL
            ",
        )
        .bind(user)
        .bind(topic)
        .bind(progress.status.as_str())
        .bind(&progress.notes)
        .bind(progress.completed_at)
        .bind(progress.updated_at)
        .bind(notes == NotesWrite::Replace)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM user_progress WHERE user_id = ?1 AND topic_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(user)
            .bind(topic)
            .fetch_one(&self.pool)
            .await
            .map_err(query_err)?;
        progress_from_row(&row)
    }

    async fn statuses_for_exam(
        &self,
        user_id: UserId,
        exam_id: ExamId,
    ) -> Result<HashMap<TopicId, ProgressStatus>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT p.topic_id, p.status
            FROM user_progress p
            JOIN topics t ON t.id = p.topic_id
            JOIN subjects sb ON sb.id = t.subject_id
            JOIN sections s ON s.id = sb.section_id
            WHERE p.user_id = ?1
              AND s.exam_id = ?2
              AND p.deleted_at IS NULL
              AND t.deleted_at IS NULL
              AND sb.deleted_at IS NULL
              AND s.deleted_at IS NULL
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("exam_id", exam_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        let mut statuses = HashMap::with_capacity(rows.len());
        for row in rows {
            let topic = topic_id_from_i64(row.try_get("topic_id").map_err(ser)?)?;
            let status: String = row.try_get("status").map_err(ser)?;
            statuses.insert(topic, ProgressStatus::parse(&status).map_err(ser)?);
        }
        Ok(statuses)
    }

    async fn list_progress(
        &self,
        user_id: UserId,
        filter: ProgressFilter,
        page: Page,
    ) -> Result<Paginated<UserProgress>, StorageError> {
        let user = id_to_i64("user_id", user_id.value())?;
        let topic = filter
            .topic_id
            .map(|t| id_to_i64("topic_id", t.value()))
            .transpose()?;
        let status = filter.status.map(ProgressStatus::as_str);

        let predicate = r"
            user_id = ?1
            AND deleted_at IS NULL
            AND (?2 IS NULL OR topic_id = ?2)
            AND (?3 IS NULL OR status = ?3)
        ";

        let total: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS n FROM user_progress WHERE {predicate}"
        ))
        .bind(user)
        .bind(topic)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(query_err)?
        .try_get("n")
        .map_err(ser)?;

        let rows = sqlx::query(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM user_progress
             WHERE {predicate}
             ORDER BY updated_at DESC, id DESC
             LIMIT ?4 OFFSET ?5"
        ))
        .bind(user)
        .bind(topic)
        .bind(status)
        .bind(id_to_i64("limit", page.limit())?)
        .bind(id_to_i64("offset", page.offset())?)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        let items = rows
            .iter()
            .map(progress_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Paginated::new(items, page, count_to_u64(total)?))
    }
}
