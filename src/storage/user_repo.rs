use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::storage::records::UserRecord;
use sqlx::PgConnection;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, password_hash, profile_pic, created_at";

/// Partial profile update; `None` fields keep their current value.
#[derive(Debug, Default, Clone)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub profile_pic: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct UserRepository {}

impl UserRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// # Errors
    /// Returns `AppError::Conflict` when the username or email is taken.
    #[tracing::instrument(level = "debug", skip(self, conn, password_hash))]
    pub(crate) async fn create(
        &self,
        conn: &mut PgConnection,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User> {
        let result = sqlx::query_as::<_, UserRecord>(&format!(
            r"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            ",
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(conn)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23505") => {
                Err(AppError::Conflict("Username or email already taken".to_string()))
            }
            Err(e) => Err(AppError::Storage(e)),
        }
    }

    /// # Errors
    /// Returns `AppError::Storage` if the query fails.
    pub(crate) async fn by_id(&self, conn: &mut PgConnection, id: Uuid) -> Result<Option<User>> {
        let record =
            sqlx::query_as::<_, UserRecord>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(conn)
                .await?;

        Ok(record.map(Into::into))
    }

    /// Case-insensitive lookup by username or email.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn resolve(&self, conn: &mut PgConnection, identifier: &str) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            r"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($1)
            ",
        ))
        .bind(identifier)
        .fetch_optional(conn)
        .await?;

        Ok(record.map(Into::into))
    }

    /// Case-insensitive substring search over usernames, excluding the
    /// searching user.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn search(
        &self,
        conn: &mut PgConnection,
        query: &str,
        exclude_id: Uuid,
        limit: i64,
    ) -> Result<Vec<User>> {
        let pattern = format!("%{}%", escape_like(query));

        let records = sqlx::query_as::<_, UserRecord>(&format!(
            r"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE username ILIKE $1 AND id <> $2
            ORDER BY LOWER(username)
            LIMIT $3
            ",
        ))
        .bind(pattern)
        .bind(exclude_id)
        .bind(limit)
        .fetch_all(conn)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Applies a partial profile update and returns the new row.
    ///
    /// # Errors
    /// Returns `AppError::ContactNotFound` if the user does not exist and
    /// `AppError::Conflict` when a new username or email is taken.
    #[tracing::instrument(level = "debug", skip(self, conn, changes))]
    pub(crate) async fn update_profile(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<User> {
        let result = sqlx::query_as::<_, UserRecord>(&format!(
            r"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                profile_pic = COALESCE($5, profile_pic)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            ",
        ))
        .bind(id)
        .bind(changes.username.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.password_hash.as_deref())
        .bind(changes.profile_pic.as_deref())
        .fetch_optional(conn)
        .await;

        match result {
            Ok(Some(record)) => Ok(record.into()),
            Ok(None) => Err(AppError::ContactNotFound),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23505") => {
                Err(AppError::Conflict("Username or email already taken".to_string()))
            }
            Err(e) => Err(AppError::Storage(e)),
        }
    }
}

fn escape_like(input: &str) -> String {
    input.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
