//! Topic-keyed publish/subscribe fan-out.
//!
//! Business logic publishes fire-and-forget; nothing is queued or retried
//! for absent subscribers. The durable state lives in storage and is
//! re-read on the next poll or reconnect.

pub mod redis;

pub use self::redis::RedisBus;

use async_trait::async_trait;
use tokio::sync::broadcast;

/// A raw message received from the bus.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub channel: String,
    pub payload: Vec<u8>,
}

/// A live update routed to one user's connected clients.
#[derive(Debug, Clone)]
pub struct LiveUpdate {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait DeliveryBus: Send + Sync + std::fmt::Debug {
    /// Publishes best-effort: failures and timeouts are logged, never
    /// surfaced to the caller.
    async fn publish(&self, topic: &str, payload: Vec<u8>);

    /// Subscribes to a channel pattern, starting a background listener for
    /// the pattern if one isn't already running.
    ///
    /// # Errors
    /// Returns an error if the subscription cannot be established.
    async fn subscribe(&self, pattern: &str) -> anyhow::Result<broadcast::Receiver<BusMessage>>;

    /// Checks bus connectivity.
    ///
    /// # Errors
    /// Returns an error if the bus is unreachable.
    async fn ping(&self) -> anyhow::Result<()>;
}

/// The wire-exact topic naming contract. Any compatible client depends on
/// these strings.
pub mod topic {
    use uuid::Uuid;

    /// Matches both conversation and contact-summary channels.
    pub const MESSAGES_PATTERN: &str = "topic/messages/*";
    /// Matches contact add/update and remove channels.
    pub const CONTACTS_PATTERN: &str = "topic/contacts/*";

    const MESSAGES_PREFIX: &str = "topic/messages/";
    const CONTACTS_PREFIX: &str = "topic/contacts/";
    const CONTACTS_REMOVE_PREFIX: &str = "topic/contacts/remove/";

    /// Directed conversation channel; subscribers listen on the ordering
    /// that starts with their own id.
    #[must_use]
    pub fn conversation(subscriber: Uuid, peer: Uuid) -> String {
        format!("{MESSAGES_PREFIX}{subscriber}/{peer}")
    }

    /// Contact-summary channel for message and unread-count changes.
    #[must_use]
    pub fn summaries(owner: Uuid) -> String {
        format!("{MESSAGES_PREFIX}{owner}")
    }

    /// Contact added / contact profile changed.
    #[must_use]
    pub fn contacts(owner: Uuid) -> String {
        format!("{CONTACTS_PREFIX}{owner}")
    }

    /// Contact removed from the owner's list.
    #[must_use]
    pub fn contact_removed(owner: Uuid) -> String {
        format!("{CONTACTS_REMOVE_PREFIX}{owner}")
    }

    /// The user a channel belongs to, for routing bus traffic to local
    /// subscriber sessions. Unknown shapes yield `None` and are dropped.
    #[must_use]
    pub fn owner_of(channel: &str) -> Option<Uuid> {
        if let Some(rest) = channel.strip_prefix(CONTACTS_REMOVE_PREFIX) {
            return Uuid::parse_str(rest).ok();
        }
        if let Some(rest) = channel.strip_prefix(CONTACTS_PREFIX) {
            return Uuid::parse_str(rest).ok();
        }
        if let Some(rest) = channel.strip_prefix(MESSAGES_PREFIX) {
            return match rest.split_once('/') {
                Some((subscriber, _peer)) => Uuid::parse_str(subscriber).ok(),
                None => Uuid::parse_str(rest).ok(),
            };
        }
        None
    }
}
