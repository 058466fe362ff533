use crate::config::MessagingConfig;
use crate::domain::contact::{ContactSummary, SymmetricEdges};
use crate::domain::message::Message;
use crate::domain::user::User;
use crate::domain::visibility;
use crate::error::{AppError, Result};
use crate::services::delivery_service::DeliveryService;
use crate::storage::DbPool;
use crate::storage::contact_repo::ContactRepository;
use crate::storage::message_repo::MessageRepository;
use crate::storage::user_repo::UserRepository;
use opentelemetry::{
    KeyValue, global,
    metrics::Counter,
};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
    marked_read_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("parley-server");
        Self {
            sent_total: meter
                .u64_counter("parley_messages_sent_total")
                .with_description("Total message send attempts by status")
                .build(),
            marked_read_total: meter
                .u64_counter("parley_conversations_marked_read_total")
                .with_description("Total mark-read operations that flagged at least one message")
                .build(),
        }
    }
}

/// Orchestrates the two user-facing message operations.
///
/// Everything durable a send produces (the row and both contact edges)
/// commits in one transaction; the fan-out publishes run after commit and
/// are best-effort.
#[derive(Clone, Debug)]
pub struct MessageService {
    pool: DbPool,
    messages: MessageRepository,
    contacts: ContactRepository,
    users: UserRepository,
    delivery: DeliveryService,
    config: MessagingConfig,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(
        pool: DbPool,
        messages: MessageRepository,
        contacts: ContactRepository,
        users: UserRepository,
        delivery: DeliveryService,
        config: MessagingConfig,
    ) -> Self {
        Self { pool, messages, contacts, users, delivery, config, metrics: Metrics::new() }
    }

    /// Sends a message and keeps both parties' contact lists in sync.
    ///
    /// # Errors
    /// Returns `AppError::EmptyContent` for blank content,
    /// `AppError::InvalidParty` for a self-send or unresolvable sender, and
    /// `AppError::RecipientNotFound` for an unknown recipient.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, content),
        fields(sender_id = %sender_id, recipient_id = %recipient_id)
    )]
    pub async fn send(&self, sender_id: Uuid, recipient_id: Uuid, content: &str) -> Result<Message> {
        if content.trim().is_empty() {
            return Err(AppError::EmptyContent);
        }
        if content.len() > self.config.max_content_bytes {
            return Err(AppError::BadRequest(format!(
                "Message content exceeds {} bytes",
                self.config.max_content_bytes
            )));
        }
        if sender_id == recipient_id {
            return Err(AppError::InvalidParty);
        }

        let mut tx = self.pool.begin().await?;

        let sender = self.users.by_id(&mut tx, sender_id).await?.ok_or(AppError::InvalidParty)?;
        let recipient = self.users.by_id(&mut tx, recipient_id).await?.ok_or(AppError::RecipientNotFound)?;

        let result = async {
            let message = self
                .messages
                .append(&mut tx, sender_id, recipient_id, content, OffsetDateTime::now_utc())
                .await?;
            let edges = self.contacts.ensure_symmetric(&mut tx, sender_id, recipient_id).await?;
            Ok::<(Message, SymmetricEdges), AppError>((message, edges))
        }
        .await;

        let (message, edges) = match result {
            Ok(pair) => pair,
            Err(e) => {
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "failure")]);
                return Err(e);
            }
        };

        tx.commit().await?;
        self.metrics.sent_total.add(1, &[KeyValue::new("status", "success")]);
        tracing::debug!(message_id = %message.id, "Message stored");

        if let Err(e) = self.fan_out(&sender, &recipient, &message, edges).await {
            tracing::warn!(error = %e, "Post-send fan-out incomplete");
        }

        Ok(message)
    }

    /// Pushes the live updates a send produces. Runs after the transaction
    /// commits; a failure here leaves durable state correct and clients
    /// catch up on their next fetch.
    async fn fan_out(
        &self,
        sender: &User,
        recipient: &User,
        message: &Message,
        edges: SymmetricEdges,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        if edges.forward_created {
            let summary = self.messages.contact_summary(&mut conn, sender.id, recipient).await?;
            self.delivery.publish_contact_update(sender.id, &summary).await;
        }
        if edges.reverse_created {
            let summary = self.messages.contact_summary(&mut conn, recipient.id, sender).await?;
            self.delivery.publish_contact_update(recipient.id, &summary).await;
        }

        self.delivery.publish_message(message).await;

        // Message first, summary second, per party. The sender authored the
        // message, so their unread count for this contact is zero.
        let sender_summary = ContactSummary::new(recipient, Some(message), 0);
        self.delivery.publish_summary(sender.id, &sender_summary).await;

        let recipient_summary = self.messages.contact_summary(&mut conn, recipient.id, sender).await?;
        self.delivery.publish_summary(recipient.id, &recipient_summary).await;

        Ok(())
    }

    /// Marks everything the contact sent to `user_id` as read and pushes the
    /// refreshed summary. A conversation with nothing unread is a silent
    /// no-op.
    ///
    /// # Errors
    /// Returns `AppError::ContactNotFound` for an unknown contact.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self),
        fields(user_id = %user_id, contact_id = %contact_id)
    )]
    pub async fn mark_read(&self, user_id: Uuid, contact_id: Uuid) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        let contact = self.users.by_id(&mut conn, contact_id).await?.ok_or(AppError::ContactNotFound)?;

        let unread = self.messages.unread_count(&mut conn, user_id, contact_id).await?;
        if unread == 0 {
            tracing::debug!("Nothing unread, skipping");
            return Ok(());
        }

        self.messages.mark_read(&mut conn, user_id, contact_id).await?;
        self.metrics.marked_read_total.add(1, &[]);

        let summary = self.messages.contact_summary(&mut conn, user_id, &contact).await?;
        self.delivery.publish_summary(user_id, &summary).await;

        Ok(())
    }

    /// The conversation as `user_id` is allowed to see it.
    ///
    /// # Errors
    /// Returns `AppError::ContactNotFound` for an unknown contact.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self),
        fields(user_id = %user_id, contact_id = %contact_id)
    )]
    pub async fn conversation(&self, user_id: Uuid, contact_id: Uuid) -> Result<Vec<Message>> {
        let mut conn = self.pool.acquire().await?;

        if self.users.by_id(&mut conn, contact_id).await?.is_none() {
            return Err(AppError::ContactNotFound);
        }

        let raw = self.messages.conversation(&mut conn, user_id, contact_id).await?;
        Ok(visibility::visible_to(raw, user_id))
    }
}
