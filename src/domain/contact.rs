use crate::domain::message::Message;
use crate::domain::user::User;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Which directions of a contact pair were newly inserted by
/// `ContactRepository::ensure_symmetric`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymmetricEdges {
    pub forward_created: bool,
    pub reverse_created: bool,
}

/// Derived contact-list entry for one (owner, contact) pair.
///
/// Never stored; recomputed from current message and overlay state on every
/// read or push so it is read-your-writes consistent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSummary {
    pub id: Uuid,
    pub username: String,
    pub profile_pic: Option<String>,
    pub last_message_content: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_message_time: Option<OffsetDateTime>,
    pub unread_count: i64,
}

impl ContactSummary {
    #[must_use]
    pub fn new(contact: &User, latest: Option<&Message>, unread_count: i64) -> Self {
        Self {
            id: contact.id,
            username: contact.username.clone(),
            profile_pic: contact.profile_pic.clone(),
            last_message_content: latest.map(|m| m.content.clone()),
            last_message_time: latest.map(|m| m.sent_at),
            unread_count,
        }
    }
}
