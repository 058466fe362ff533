use crate::domain::contact::ContactSummary;
use crate::domain::message::Message;
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::storage::records::MessageRecord;
use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

/// Overlay flag kinds in `message_flags`.
const FLAG_HIDDEN: i16 = 0;
const FLAG_READ: i16 = 1;

const MESSAGE_COLUMNS: &str = r"
    m.id, m.sender_id, m.recipient_id, m.content, m.sent_at,
    COALESCE(array_agg(f.user_id) FILTER (WHERE f.kind = 0), '{}') AS hidden_for,
    COALESCE(array_agg(f.user_id) FILTER (WHERE f.kind = 1), '{}') AS read_by
";

#[derive(Clone, Debug, Default)]
pub struct MessageRepository {}

impl MessageRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Appends a message with a fresh id and `sent_at = now`.
    ///
    /// Party validation belongs to the caller; the schema constraints are a
    /// backstop and are mapped back onto the caller-visible error kinds.
    ///
    /// # Errors
    /// Returns `AppError::RecipientNotFound` if either party does not exist,
    /// `AppError::InvalidParty` on a self-send, `AppError::Storage` otherwise.
    #[tracing::instrument(level = "debug", skip(self, conn, content))]
    pub(crate) async fn append(
        &self,
        conn: &mut PgConnection,
        sender_id: Uuid,
        recipient_id: Uuid,
        content: &str,
        now: OffsetDateTime,
    ) -> Result<Message> {
        let result = sqlx::query_as::<_, MessageRecord>(
            r"
            INSERT INTO messages (id, sender_id, recipient_id, content, sent_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, sender_id, recipient_id, content, sent_at,
                      '{}'::uuid[] AS hidden_for, '{}'::uuid[] AS read_by
            ",
        )
        .bind(Uuid::now_v7())
        .bind(sender_id)
        .bind(recipient_id)
        .bind(content)
        .bind(now)
        .fetch_one(conn)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23503") => {
                // Foreign key violation: one of the parties does not exist
                Err(AppError::RecipientNotFound)
            }
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23514") => {
                Err(AppError::InvalidParty)
            }
            Err(e) => Err(AppError::Storage(e)),
        }
    }

    /// Fetches the full conversation between two users, unfiltered by
    /// visibility, in total `(sent_at, id)` order.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn conversation(
        &self,
        conn: &mut PgConnection,
        user_a: Uuid,
        user_b: Uuid,
    ) -> Result<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            r"
            SELECT {MESSAGE_COLUMNS}
            FROM messages m
            LEFT JOIN message_flags f ON f.message_id = m.id
            WHERE (m.sender_id = $1 AND m.recipient_id = $2)
               OR (m.sender_id = $2 AND m.recipient_id = $1)
            GROUP BY m.id
            ORDER BY m.sent_at ASC, m.id ASC
            ",
        ))
        .bind(user_a)
        .bind(user_b)
        .fetch_all(conn)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Hides every message of the conversation for `user_id`.
    ///
    /// One bulk conditional insert, so concurrent hides (or a hide racing a
    /// send) can never lose updates; rows appended after this statement
    /// starts are not affected.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn hide(&self, conn: &mut PgConnection, user_id: Uuid, contact_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r"
            INSERT INTO message_flags (message_id, user_id, kind)
            SELECT id, $1, $3
            FROM messages
            WHERE (sender_id = $1 AND recipient_id = $2)
               OR (sender_id = $2 AND recipient_id = $1)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(user_id)
        .bind(contact_id)
        .bind(FLAG_HIDDEN)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Marks every message sent to `user_id` by `contact_id` as read.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn mark_read(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        contact_id: Uuid,
    ) -> Result<u64> {
        let result = sqlx::query(
            r"
            INSERT INTO message_flags (message_id, user_id, kind)
            SELECT id, $1, $3
            FROM messages
            WHERE sender_id = $2 AND recipient_id = $1
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(user_id)
        .bind(contact_id)
        .bind(FLAG_READ)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Most recent conversation message not hidden for `user_id`.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn latest_visible(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        contact_id: Uuid,
    ) -> Result<Option<Message>> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            r"
            SELECT {MESSAGE_COLUMNS}
            FROM messages m
            LEFT JOIN message_flags f ON f.message_id = m.id
            WHERE ((m.sender_id = $1 AND m.recipient_id = $2)
                OR (m.sender_id = $2 AND m.recipient_id = $1))
              AND NOT EXISTS (
                  SELECT 1 FROM message_flags h
                  WHERE h.message_id = m.id AND h.user_id = $1 AND h.kind = $3
              )
            GROUP BY m.id
            ORDER BY m.sent_at DESC, m.id DESC
            LIMIT 1
            ",
        ))
        .bind(user_id)
        .bind(contact_id)
        .bind(FLAG_HIDDEN)
        .fetch_optional(conn)
        .await?;

        Ok(record.map(Into::into))
    }

    /// Number of messages sent by `contact_id` that `owner_id` can see and
    /// has not read. Recomputed from overlay state on every call; hidden
    /// messages do not count.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn unread_count(
        &self,
        conn: &mut PgConnection,
        owner_id: Uuid,
        contact_id: Uuid,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM messages m
            WHERE m.sender_id = $2 AND m.recipient_id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM message_flags f
                  WHERE f.message_id = m.id AND f.user_id = $1 AND f.kind = $3
              )
              AND NOT EXISTS (
                  SELECT 1 FROM message_flags f
                  WHERE f.message_id = m.id AND f.user_id = $1 AND f.kind = $4
              )
            ",
        )
        .bind(owner_id)
        .bind(contact_id)
        .bind(FLAG_HIDDEN)
        .bind(FLAG_READ)
        .fetch_one(conn)
        .await?;

        Ok(count)
    }

    /// Builds the derived contact-list entry for `(owner, contact)`.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if a query fails.
    pub(crate) async fn contact_summary(
        &self,
        conn: &mut PgConnection,
        owner_id: Uuid,
        contact: &User,
    ) -> Result<ContactSummary> {
        let latest = self.latest_visible(&mut *conn, owner_id, contact.id).await?;
        let unread = self.unread_count(&mut *conn, owner_id, contact.id).await?;

        Ok(ContactSummary::new(contact, latest.as_ref(), unread))
    }

    /// Deletes all messages sent before `cutoff`, regardless of overlay
    /// state. Overlay flags go with the rows via cascade; a hide or
    /// mark-read racing the purge simply finds no rows to flag.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn purge_older_than(
        &self,
        conn: &mut PgConnection,
        cutoff: OffsetDateTime,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE sent_at < $1").bind(cutoff).execute(conn).await?;
        Ok(result.rows_affected())
    }
}
