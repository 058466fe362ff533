use crate::config::MessagingConfig;
use crate::domain::contact::ContactSummary;
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::services::delivery_service::DeliveryService;
use crate::storage::DbPool;
use crate::storage::contact_repo::ContactRepository;
use crate::storage::message_repo::MessageRepository;
use crate::storage::user_repo::{ProfileChanges, UserRepository};
use opentelemetry::{global, metrics::Counter};
use sqlx::PgConnection;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    added_total: Counter<u64>,
    removed_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("parley-server");
        Self {
            added_total: meter
                .u64_counter("parley_contacts_added_total")
                .with_description("Total contact edges created by explicit add")
                .build(),
            removed_total: meter
                .u64_counter("parley_contacts_removed_total")
                .with_description("Total contact edges removed")
                .build(),
        }
    }
}

/// Explicit contact-list management and profile fan-out.
#[derive(Clone, Debug)]
pub struct ContactService {
    pool: DbPool,
    users: UserRepository,
    contacts: ContactRepository,
    messages: MessageRepository,
    delivery: DeliveryService,
    config: MessagingConfig,
    metrics: Metrics,
}

impl ContactService {
    #[must_use]
    pub fn new(
        pool: DbPool,
        users: UserRepository,
        contacts: ContactRepository,
        messages: MessageRepository,
        delivery: DeliveryService,
        config: MessagingConfig,
    ) -> Self {
        Self { pool, users, contacts, messages, delivery, config, metrics: Metrics::new() }
    }

    /// Adds a contact by username or email. Adding an existing contact is a
    /// no-op success, not a failure.
    ///
    /// # Errors
    /// Returns `AppError::ContactNotFound` for an unknown identifier and
    /// `AppError::InvalidParty` for a self-add.
    #[tracing::instrument(err(level = "warn"), skip(self, identifier), fields(owner_id = %owner_id))]
    pub async fn add_contact(&self, owner_id: Uuid, identifier: &str) -> Result<ContactSummary> {
        let mut conn = self.pool.acquire().await?;

        let contact = self.users.resolve(&mut conn, identifier).await?.ok_or(AppError::ContactNotFound)?;
        if contact.id == owner_id {
            return Err(AppError::InvalidParty);
        }

        let created = self.contacts.add(&mut conn, owner_id, contact.id).await?;
        let summary = self.messages.contact_summary(&mut conn, owner_id, &contact).await?;

        if created {
            self.metrics.added_total.add(1, &[]);
            tracing::info!(contact_id = %contact.id, "Contact added");
            self.delivery.publish_contact_update(owner_id, &summary).await;
        }

        Ok(summary)
    }

    /// Removes a contact and hides the shared history for the remover, in
    /// one transaction. The other party keeps both the contact and the
    /// history.
    ///
    /// # Errors
    /// Returns `AppError::ContactNotFound` if the user or the edge does not
    /// exist.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self),
        fields(owner_id = %owner_id, contact_id = %contact_id)
    )]
    pub async fn remove_contact(&self, owner_id: Uuid, contact_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let contact = self.users.by_id(&mut tx, contact_id).await?.ok_or(AppError::ContactNotFound)?;

        if !self.contacts.remove(&mut tx, owner_id, contact_id).await? {
            return Err(AppError::ContactNotFound);
        }
        let hidden = self.messages.hide(&mut tx, owner_id, contact_id).await?;

        tx.commit().await?;
        self.metrics.removed_total.add(1, &[]);
        tracing::info!(hidden_messages = hidden, "Contact removed and history hidden");

        // Only the remover's clients are told; the other side keeps the
        // contact.
        self.delivery.publish_contact_removed(owner_id, &contact.profile()).await;

        Ok(())
    }

    /// Pinned contacts merged with username matches, each carrying a freshly
    /// computed summary. An empty query returns just the contact list.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if a query fails.
    #[tracing::instrument(err(level = "warn"), skip(self, query), fields(owner_id = %owner_id))]
    pub async fn search(&self, owner_id: Uuid, query: &str) -> Result<Vec<ContactSummary>> {
        let mut conn = self.pool.acquire().await?;

        let mut users: Vec<User> = Vec::new();
        for contact_id in self.contacts.list_for(&mut conn, owner_id).await? {
            if let Some(user) = self.users.by_id(&mut conn, contact_id).await? {
                users.push(user);
            }
        }

        if !query.is_empty() {
            for user in self.users.search(&mut conn, query, owner_id, self.config.search_limit).await? {
                if !users.iter().any(|u| u.id == user.id) {
                    users.push(user);
                }
            }
        }

        let mut summaries = Vec::with_capacity(users.len());
        for user in &users {
            summaries.push(self.messages.contact_summary(&mut conn, owner_id, user).await?);
        }

        Ok(summaries)
    }

    /// # Errors
    /// Returns `AppError::AuthError` if the authenticated user no longer
    /// exists.
    pub async fn profile(&self, user_id: Uuid) -> Result<User> {
        let mut conn = self.pool.acquire().await?;
        self.users.by_id(&mut conn, user_id).await?.ok_or(AppError::AuthError)
    }

    /// Applies a partial profile update and fans the new profile out to
    /// every user whose contact list shows it.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` when a new username or email is taken.
    #[tracing::instrument(err(level = "warn"), skip(self, changes), fields(user_id = %user_id))]
    pub async fn update_profile(&self, user_id: Uuid, changes: &ProfileChanges) -> Result<User> {
        let mut conn = self.pool.acquire().await?;

        let updated = self.users.update_profile(&mut conn, user_id, changes).await?;

        if let Err(e) = self.fan_out_profile(&mut conn, &updated).await {
            tracing::warn!(error = %e, "Profile fan-out incomplete");
        }

        Ok(updated)
    }

    async fn fan_out_profile(&self, conn: &mut PgConnection, updated: &User) -> Result<()> {
        for owner_id in self.contacts.owners_of(&mut *conn, updated.id).await? {
            let summary = self.messages.contact_summary(&mut *conn, owner_id, updated).await?;
            self.delivery.publish_contact_update(owner_id, &summary).await;
        }
        Ok(())
    }
}
