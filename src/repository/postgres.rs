use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::Repository;
use crate::domain::User;
use crate::error::StorageError;
use crate::verification::{VerificationEntry, VerificationType};

/// Postgres-backed repository
///
/// Expects the `users` and `verifications` tables from `migrations/`.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    username: String,
    token_hash: String,
    is_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            username: row.username,
            token_hash: row.token_hash,
            is_verified: row.is_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VerificationRow {
    email: String,
    code: String,
    expires_at: DateTime<Utc>,
    verification_type: String,
}

impl TryFrom<VerificationRow> for VerificationEntry {
    type Error = StorageError;

    fn try_from(row: VerificationRow) -> Result<Self, Self::Error> {
        let verification_type = row
            .verification_type
            .parse::<VerificationType>()
            .map_err(StorageError::QueryExecution)?;

        Ok(Self {
            email: row.email,
            code: row.code,
            expires_at: row.expires_at,
            verification_type,
        })
    }
}

fn ensure_affected(rows: u64, what: impl std::fmt::Display) -> Result<(), StorageError> {
    if rows == 0 {
        return Err(StorageError::NotFound(format!("user {}", what)));
    }
    Ok(())
}

const USER_COLUMNS: &str =
    "id, email, password_hash, username, token_hash, is_verified, created_at, updated_at";

#[async_trait]
impl Repository for PostgresRepository {
    #[tracing::instrument(name = "Create user", skip(self, user), fields(user_id = %user.id))]
    async fn create(&self, user: &User) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, username, token_hash, is_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.username)
        .bind(&user.token_hash)
        .bind(user.is_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    #[tracing::instrument(name = "Update user", skip(self, user), fields(user_id = %user.id))]
    async fn update(&self, user: &User) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE users SET username = $1, updated_at = $2 WHERE id = $3")
            .bind(&user.username)
            .bind(Utc::now())
            .bind(user.id)
            .execute(&self.pool)
            .await?;

        ensure_affected(result.rows_affected(), user.id)
    }

    #[tracing::instrument(name = "Rotate token hash", skip(self, token_hash))]
    async fn rotate_token_hash(&self, id: Uuid, token_hash: &str) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE users SET token_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(token_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        ensure_affected(result.rows_affected(), id)
    }

    async fn set_verified(&self, email: &str, verified: bool) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE users SET is_verified = $1, updated_at = $2 WHERE email = $3",
        )
        .bind(verified)
        .bind(Utc::now())
        .bind(email)
        .execute(&self.pool)
        .await?;

        ensure_affected(result.rows_affected(), email)
    }

    async fn upsert_verification_entry(&self, entry: &VerificationEntry) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO verifications (email, verification_type, code, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email, verification_type)
            DO UPDATE SET code = EXCLUDED.code, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&entry.email)
        .bind(entry.verification_type.as_str())
        .bind(&entry.code)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_verification_entry(
        &self,
        email: &str,
        verification_type: VerificationType,
    ) -> Result<Option<VerificationEntry>, StorageError> {
        let row = sqlx::query_as::<_, VerificationRow>(
            r#"
            SELECT email, code, expires_at, verification_type
            FROM verifications
            WHERE email = $1 AND verification_type = $2
            "#,
        )
        .bind(email)
        .bind(verification_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(VerificationEntry::try_from).transpose()
    }

    async fn delete_verification_entry(
        &self,
        email: &str,
        verification_type: VerificationType,
    ) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM verifications WHERE email = $1 AND verification_type = $2")
            .bind(email)
            .bind(verification_type.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn consume_verification_entry(
        &self,
        email: &str,
        verification_type: VerificationType,
        code: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "DELETE FROM verifications WHERE email = $1 AND verification_type = $2 AND code = $3",
        )
        .bind(email)
        .bind(verification_type.as_str())
        .bind(code)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Both hashes change in one statement, so no reader sees the new
    /// password paired with the old token hash.
    #[tracing::instrument(name = "Update password", skip(self, password_hash, token_hash))]
    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        token_hash: &str,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, token_hash = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(password_hash)
        .bind(token_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_affected(result.rows_affected(), id)
    }
}
