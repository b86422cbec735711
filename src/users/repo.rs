use anyhow::Context;
use axum::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{FieldUpdate, NewUser, User, UserRow, UserStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence of user documents. Token-set mutations are atomic per call.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Lookup by normalised (lowercase) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    async fn update_fields(&self, id: Uuid, update: FieldUpdate) -> Result<(), StoreError>;
    async fn push_token(&self, id: Uuid, token: &str) -> Result<(), StoreError>;
    /// Removing a token that is not present is not an error.
    async fn pull_token(&self, id: Uuid, token: &str) -> Result<(), StoreError>;
    async fn close(&self) -> anyhow::Result<()>;
}

const USER_COLUMNS: &str = "id, full_name, birthday, bio, email, password_hash, profile_picture, \
     phone_number, user_status, user_role, valid_tokens, creation_date, modified_date";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn ensure_updated(rows: u64) -> Result<(), StoreError> {
    if rows == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(row.map(User::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(row.map(User::from))
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let user = user.into_user(OffsetDateTime::now_utc());
        let res = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, full_name, email, password_hash, user_status, user_role,
                               valid_tokens, creation_date, modified_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.status.code())
        .bind(user.role.as_str())
        .bind(&user.valid_tokens)
        .bind(user.creation_date)
        .bind(user.modified_date)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(row) => Ok(row.into()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateEmail)
            }
            Err(e) => Err(anyhow::Error::new(e).context("insert user").into()),
        }
    }

    async fn update_fields(&self, id: Uuid, update: FieldUpdate) -> Result<(), StoreError> {
        let now = OffsetDateTime::now_utc();
        let query = match update {
            FieldUpdate::PersonalInfo(info) => sqlx::query(
                r#"
                UPDATE users
                   SET full_name = $2, bio = $3, birthday = $4, phone_number = $5,
                       modified_date = $6
                 WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(info.full_name)
            .bind(info.bio)
            .bind(info.birthday)
            .bind(info.phone_number)
            .bind(now),
            FieldUpdate::PasswordHash(hash) => sqlx::query(
                "UPDATE users SET password_hash = $2, modified_date = $3 WHERE id = $1",
            )
            .bind(id)
            .bind(hash)
            .bind(now),
            FieldUpdate::ProfilePicture(path) => sqlx::query(
                "UPDATE users SET profile_picture = $2, modified_date = $3 WHERE id = $1",
            )
            .bind(id)
            .bind(path)
            .bind(now),
            FieldUpdate::Status(UserStatus::Disabled) => sqlx::query(
                r#"
                UPDATE users
                   SET user_status = $2, valid_tokens = '{}', modified_date = $3
                 WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(UserStatus::Disabled.code())
            .bind(now),
            FieldUpdate::Status(status) => sqlx::query(
                "UPDATE users SET user_status = $2, modified_date = $3 WHERE id = $1",
            )
            .bind(id)
            .bind(status.code())
            .bind(now),
        };

        let done = query
            .execute(&self.db)
            .await
            .context("update user fields")?;
        ensure_updated(done.rows_affected())
    }

    async fn push_token(&self, id: Uuid, token: &str) -> Result<(), StoreError> {
        let done = sqlx::query(
            "UPDATE users SET valid_tokens = array_append(valid_tokens, $2) WHERE id = $1",
        )
        .bind(id)
        .bind(token)
        .execute(&self.db)
        .await
        .context("append valid token")?;
        ensure_updated(done.rows_affected())
    }

    async fn pull_token(&self, id: Uuid, token: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET valid_tokens = array_remove(valid_tokens, $2) WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.db)
            .await
            .context("remove valid token")?;
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.db.close().await;
        Ok(())
    }
}
