//! Pure per-user visibility over a raw conversation.
//!
//! The store returns conversations unfiltered; hiding is applied here so the
//! rule stays independently testable against literal message fixtures.

use crate::domain::message::Message;
use uuid::Uuid;

/// Returns the subsequence of `messages` the viewer is allowed to see,
/// preserving order.
#[must_use]
pub fn visible_to(messages: Vec<Message>, viewer: Uuid) -> Vec<Message> {
    messages.into_iter().filter(|m| !m.is_hidden_for(viewer)).collect()
}
