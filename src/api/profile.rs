use crate::api::AppState;
use crate::api::dto::profile::UpdateProfileRequest;
use crate::api::middleware::AuthUser;
use crate::domain::user::Profile;
use crate::error::Result;
use crate::storage::user_repo::ProfileChanges;
use axum::{Json, extract::State};

/// Returns the caller's own profile.
///
/// # Errors
/// Returns `AppError::AuthError` if the account no longer exists.
pub async fn get_profile(auth_user: AuthUser, State(state): State<AppState>) -> Result<Json<Profile>> {
    let user = state.contact_service.profile(auth_user.user_id).await?;
    Ok(Json(user.profile()))
}

/// Applies a partial profile update and fans the change out to everyone
/// listing the caller as a contact.
///
/// # Errors
/// Returns `AppError::Conflict` when a new username or email is taken.
pub async fn update_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>> {
    let password_hash = match req.password.as_deref() {
        Some(password) => Some(state.auth_service.hash_password(password).await?),
        None => None,
    };

    let changes = ProfileChanges {
        username: req.username.filter(|u| !u.is_empty()),
        email: req.email.filter(|e| !e.is_empty()),
        password_hash,
        profile_pic: req.profile_pic.filter(|p| !p.is_empty()),
    };

    let updated = state.contact_service.update_profile(auth_user.user_id, &changes).await?;
    Ok(Json(updated.profile()))
}
