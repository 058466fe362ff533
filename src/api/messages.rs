use crate::api::AppState;
use crate::api::dto::messaging::SendMessageRequest;
use crate::api::middleware::AuthUser;
use crate::domain::message::Message;
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Sends a message to a recipient.
///
/// # Errors
/// Returns `AppError::EmptyContent` or `AppError::InvalidParty` on invalid
/// input, `AppError::RecipientNotFound` for an unknown recipient.
pub async fn send_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let message = state.message_service.send(auth_user.user_id, req.recipient_id, &req.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Returns the conversation with a contact as the caller sees it.
///
/// # Errors
/// Returns `AppError::ContactNotFound` for an unknown contact.
pub async fn get_conversation(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>> {
    let messages = state.message_service.conversation(auth_user.user_id, contact_id).await?;
    Ok(Json(messages))
}

/// Marks everything the contact sent as read.
///
/// # Errors
/// Returns `AppError::ContactNotFound` for an unknown contact.
pub async fn mark_read(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.message_service.mark_read(auth_user.user_id, contact_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
