use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// A single direct message.
///
/// The core row is immutable after append; the two overlay sets are the only
/// mutable state and hold user ids drawn from {sender, recipient}. Neither
/// set is ever serialized to clients — read state reaches them only through
/// derived unread counts and filtered listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
    #[serde(skip)]
    pub hidden_for: Vec<Uuid>,
    #[serde(skip)]
    pub read_by: Vec<Uuid>,
}

impl Message {
    #[must_use]
    pub fn is_hidden_for(&self, user_id: Uuid) -> bool {
        self.hidden_for.contains(&user_id)
    }

    #[must_use]
    pub fn is_read_by(&self, user_id: Uuid) -> bool {
        self.read_by.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_is_camel_case_and_omits_overlay_sets() {
        let viewer = Uuid::new_v4();
        let msg = Message {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            content: "hi".to_string(),
            // 2024-05-01T12:30:00Z
            sent_at: OffsetDateTime::from_unix_timestamp(1_714_566_600).expect("timestamp"),
            hidden_for: vec![viewer],
            read_by: vec![viewer],
        };

        let value = serde_json::to_value(&msg).expect("serialize");
        let obj = value.as_object().expect("object");

        assert!(obj.contains_key("senderId"));
        assert!(obj.contains_key("recipientId"));
        assert_eq!(obj["sentAt"], "2024-05-01T12:30:00Z");
        assert!(!obj.contains_key("hiddenFor"));
        assert!(!obj.contains_key("readBy"));
        assert!(!obj.contains_key("hidden_for"));
    }
}
