use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub profile_pic: Option<String>,
    pub created_at: Option<OffsetDateTime>,
}

/// The subset of a user other people are allowed to see.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub profile_pic: Option<String>,
}

impl User {
    #[must_use]
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            profile_pic: self.profile_pic.clone(),
        }
    }
}
