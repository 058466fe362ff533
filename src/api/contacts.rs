use crate::api::AppState;
use crate::api::dto::contacts::{AddContactRequest, SearchParams};
use crate::api::middleware::AuthUser;
use crate::domain::contact::ContactSummary;
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Adds a contact by username or email. Idempotent.
///
/// # Errors
/// Returns `AppError::ContactNotFound` for an unknown identifier.
pub async fn add_contact(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<AddContactRequest>,
) -> Result<Json<ContactSummary>> {
    let summary = state.contact_service.add_contact(auth_user.user_id, &req.username).await?;
    Ok(Json(summary))
}

/// Removes a contact and hides the shared history for the caller.
///
/// # Errors
/// Returns `AppError::ContactNotFound` if the contact is not on the list.
pub async fn remove_contact(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.contact_service.remove_contact(auth_user.user_id, contact_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Contact list merged with username search results.
///
/// # Errors
/// Returns `AppError::Storage` if a query fails.
pub async fn search_users(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ContactSummary>>> {
    let summaries = state.contact_service.search(auth_user.user_id, &params.query).await?;
    Ok(Json(summaries))
}
