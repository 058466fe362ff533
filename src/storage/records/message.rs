use crate::domain::message::Message;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRecord {
    pub(crate) id: Uuid,
    pub(crate) sender_id: Uuid,
    pub(crate) recipient_id: Uuid,
    pub(crate) content: String,
    pub(crate) sent_at: OffsetDateTime,
    pub(crate) hidden_for: Vec<Uuid>,
    pub(crate) read_by: Vec<Uuid>,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            sender_id: record.sender_id,
            recipient_id: record.recipient_id,
            content: record.content,
            sent_at: record.sent_at,
            hidden_for: record.hidden_for,
            read_by: record.read_by,
        }
    }
}
