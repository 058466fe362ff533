use serde::Deserialize;

/// Partial update; absent or empty fields keep their current value.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub profile_pic: Option<String>,
}
