use crate::api::AppState;
use crate::api::dto::auth::{LoginRequest, RegisterRequest, SessionResponse};
use crate::error::Result;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// Creates a new account.
///
/// # Errors
/// Returns `AppError::BadRequest` on malformed input and
/// `AppError::Conflict` when the username or email is taken.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let user = state.auth_service.register(&req.username, &req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(user.profile())))
}

/// Exchanges credentials for an access token.
///
/// # Errors
/// Returns `AppError::AuthError` on bad credentials.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let session = state.auth_service.login(&req.identifier, &req.password).await?;
    Ok(Json(SessionResponse {
        token: session.token,
        expires_at: session.expires_at,
        user_id: session.user_id,
    }))
}
