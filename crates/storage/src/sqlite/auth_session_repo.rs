use chrono::{DateTime, Utc};
use prep_core::model::{AuthSession, SessionToken};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{id_to_i64, query_err, ser, user_id_from_i64};
use crate::repository::{AuthSessionRepository, StorageError};

#[async_trait::async_trait]
impl AuthSessionRepository for SqliteRepository {
    async fn insert_auth_session(&self, session: &AuthSession) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO auth_sessions (token, user_id, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(session.token.to_string())
        .bind(id_to_i64("user_id", session.user_id.value())?)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn get_auth_session(
        &self,
        token: SessionToken,
    ) -> Result<Option<AuthSession>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT token, user_id, created_at, expires_at
            FROM auth_sessions
            WHERE token = ?1
            ",
        )
        .bind(token.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("token").map_err(ser)?;
        Ok(Some(AuthSession {
            token: raw.parse().map_err(ser)?,
            user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
            created_at: row.try_get("created_at").map_err(ser)?,
            expires_at: row.try_get("expires_at").map_err(ser)?,
        }))
    }

    async fn delete_auth_session(&self, token: SessionToken) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM auth_sessions WHERE token = ?1")
            .bind(token.to_string())
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn purge_expired_auth_sessions(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= ?1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(res.rows_affected())
    }
}
