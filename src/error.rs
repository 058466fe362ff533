use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage unavailable: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("Sender and recipient must be distinct users")]
    InvalidParty,
    #[error("Message content must not be empty")]
    EmptyContent,
    #[error("Recipient not found")]
    RecipientNotFound,
    #[error("Contact not found")]
    ContactNotFound,
    #[error("Authentication failed")]
    AuthError,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Storage(e) => {
                tracing::error!(error = %e, "Storage error");
                (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable".to_string())
            }
            Self::InvalidParty => {
                tracing::debug!("Rejected self-referential party");
                (StatusCode::BAD_REQUEST, "Sender and recipient must be distinct users".to_string())
            }
            Self::EmptyContent => {
                tracing::debug!("Rejected empty message content");
                (StatusCode::BAD_REQUEST, "Message content must not be empty".to_string())
            }
            Self::RecipientNotFound => {
                tracing::debug!("Recipient not found");
                (StatusCode::NOT_FOUND, "Recipient not found".to_string())
            }
            Self::ContactNotFound => {
                tracing::debug!("Contact not found");
                (StatusCode::NOT_FOUND, "Contact not found".to_string())
            }
            Self::AuthError => {
                tracing::debug!("Authentication failed");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            Self::BadRequest(msg) => {
                tracing::debug!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, msg)
            }
            Self::Conflict(msg) => {
                tracing::debug!(message = %msg, "Conflict");
                (StatusCode::CONFLICT, msg)
            }
            Self::Internal => {
                tracing::error!("Internal server error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
