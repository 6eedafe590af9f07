use chrono::{DateTime, Utc};
use prep_core::model::{PomodoroSession, PomodoroSessionId, StudyTotals, UserId};
use prep_core::pagination::{Page, Paginated};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    count_to_u64, id_to_i64, pomodoro_from_row, pomodoro_id_from_i64, query_err, ser,
};
use crate::repository::{PomodoroRepository, StorageError};

const POMODORO_COLUMNS: &str = "id, user_id, duration, is_break, completed, started_at, completed_at";

#[async_trait::async_trait]
impl PomodoroRepository for SqliteRepository {
    async fn insert_pomodoro(
        &self,
        user_id: UserId,
        duration: u32,
        is_break: bool,
        started_at: DateTime<Utc>,
    ) -> Result<PomodoroSession, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO pomodoro_sessions (user_id, duration, is_break, completed, started_at)
            VALUES (?1, ?2, ?3, 0, ?4)
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(i64::from(duration))
        .bind(is_break)
        .bind(started_at)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(PomodoroSession {
            id: pomodoro_id_from_i64(res.last_insert_rowid())?,
            user_id,
            duration,
            is_break,
            completed: false,
            started_at,
            completed_at: None,
        })
    }

    async fn get_pomodoro(
        &self,
        user_id: UserId,
        id: PomodoroSessionId,
    ) -> Result<Option<PomodoroSession>, StorageError> {
        let sql = format!(
            "SELECT {POMODORO_COLUMNS} FROM pomodoro_sessions
             WHERE id = ?1 AND user_id = ?2 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(id_to_i64("pomodoro_session_id", id.value())?)
            .bind(id_to_i64("user_id", user_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(pomodoro_from_row).transpose()
    }

    async fn save_pomodoro_completion(
        &self,
        session: &PomodoroSession,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE pomodoro_sessions
            SET completed = ?3, completed_at = ?4
            WHERE id = ?1 AND user_id = ?2 AND deleted_at IS NULL AND completed = 0
            ",
        )
        .bind(id_to_i64("pomodoro_session_id", session.id.value())?)
        .bind(id_to_i64("user_id", session.user_id.value())?)
        .bind(session.completed)
        .bind(session.completed_at)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn list_pomodoros(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Paginated<PomodoroSession>, StorageError> {
        let user = id_to_i64("user_id", user_id.value())?;

        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM pomodoro_sessions WHERE user_id = ?1 AND deleted_at IS NULL",
        )
        .bind(user)
        .fetch_one(&self.pool)
        .await
        .map_err(query_err)?
        .try_get("n")
        .map_err(ser)?;

        let sql = format!(
            "SELECT {POMODORO_COLUMNS} FROM pomodoro_sessions
             WHERE user_id = ?1 AND deleted_at IS NULL
             ORDER BY started_at DESC, id DESC
             LIMIT ?2 OFFSET ?3"
        );
        let rows = sqlx::query(&sql)
            .bind(user)
            .bind(id_to_i64("limit", page.limit())?)
            .bind(id_to_i64("offset", page.offset())?)
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;

        let items = rows
            .iter()
            .map(pomodoro_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Paginated::new(items, page, count_to_u64(total)?))
    }

    async fn work_totals(
        &self,
        user_id: UserId,
        since: Option<DateTime<Utc>>,
    ) -> Result<StudyTotals, StorageError> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS sessions, COALESCE(SUM(duration), 0) AS minutes
            FROM pomodoro_sessions
            WHERE user_id = ?1
              AND deleted_at IS NULL
              AND completed = 1
              AND is_break = 0
              AND (?2 IS NULL OR started_at >= ?2)
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(StudyTotals {
            sessions: count_to_u64(row.try_get("sessions").map_err(ser)?)?,
            minutes: count_to_u64(row.try_get("minutes").map_err(ser)?)?,
        })
    }
}
