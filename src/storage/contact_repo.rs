use crate::domain::contact::SymmetricEdges;
use crate::error::Result;
use sqlx::PgConnection;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct ContactRepository {}

impl ContactRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Inserts one directed edge if absent. The conditional insert is a
    /// single atomic check-and-insert, so concurrent first messages between
    /// the same pair cannot produce duplicates.
    ///
    /// Returns whether the edge was newly created; an existing edge is a
    /// successful no-op.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn add(&self, conn: &mut PgConnection, owner_id: Uuid, contact_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO contacts (owner_id, contact_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(owner_id)
        .bind(contact_id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Ensures both directions of the pair exist, reporting which were newly
    /// created so the caller can decide whether to push "added"
    /// notifications.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if either insert fails.
    pub(crate) async fn ensure_symmetric(
        &self,
        conn: &mut PgConnection,
        user_a: Uuid,
        user_b: Uuid,
    ) -> Result<SymmetricEdges> {
        let forward_created = self.add(&mut *conn, user_a, user_b).await?;
        let reverse_created = self.add(&mut *conn, user_b, user_a).await?;

        Ok(SymmetricEdges { forward_created, reverse_created })
    }

    /// Deletes the directed edge, returning whether it existed.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn remove(
        &self,
        conn: &mut PgConnection,
        owner_id: Uuid,
        contact_id: Uuid,
    ) -> Result<bool> {
        let result = sqlx::query("DELETE FROM contacts WHERE owner_id = $1 AND contact_id = $2")
            .bind(owner_id)
            .bind(contact_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Ids on `owner_id`'s contact list.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if the query fails.
    pub(crate) async fn list_for(&self, conn: &mut PgConnection, owner_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar("SELECT contact_id FROM contacts WHERE owner_id = $1 ORDER BY created_at")
            .bind(owner_id)
            .fetch_all(conn)
            .await?;

        Ok(ids)
    }

    /// Owners whose contact list contains `contact_id`. Used to fan a
    /// profile change out to everyone who would render it.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if the query fails.
    pub(crate) async fn owners_of(&self, conn: &mut PgConnection, contact_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar("SELECT owner_id FROM contacts WHERE contact_id = $1")
            .bind(contact_id)
            .fetch_all(conn)
            .await?;

        Ok(ids)
    }
}
