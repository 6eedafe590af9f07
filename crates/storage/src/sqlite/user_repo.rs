use chrono::{DateTime, Utc};
use prep_core::model::{Email, InstitutionId, NewUser, User, UserId};

use super::SqliteRepository;
use super::mapping::{
    id_to_i64, institution_id_from_i64, query_err, user_from_row, user_id_from_i64,
};
use crate::repository::{StorageError, UserRepository};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, \
     institution_id, target_score, daily_study_hours, is_active, last_login_at, created_at";

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, user: &NewUser, now: DateTime<Utc>) -> Result<User, StorageError> {
        let institution = user
            .institution_id
            .map(|i| id_to_i64("institution_id", i.value()))
            .transpose()?;

        let res = sqlx::query(
            r"
            INSERT INTO users (email, password_hash, first_name, last_name, role,
                               institution_id, target_score, daily_study_hours,
                               is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9)
            ",
        )
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(institution)
        .bind(user.target_score.map(i64::from))
        .bind(user.daily_study_hours.map(i64::from))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(User {
            id: user_id_from_i64(res.last_insert_rowid())?,
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            institution_id: user.institution_id,
            target_score: user.target_score,
            daily_study_hours: user.daily_study_hours,
            is_active: true,
            last_login_at: None,
            created_at: now,
        })
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1 AND deleted_at IS NULL");
        let row = sqlx::query(&sql)
            .bind(id_to_i64("user_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, StorageError> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 AND deleted_at IS NULL");
        let row = sqlx::query(&sql)
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StorageError> {
        let res = sqlx::query(
            "UPDATE users SET last_login_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(id_to_i64("user_id", id.value())?)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn insert_institution(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<InstitutionId, StorageError> {
        let res = sqlx::query("INSERT INTO institutions (name, created_at) VALUES (?1, ?2)")
            .bind(name)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        institution_id_from_i64(res.last_insert_rowid())
    }
}
