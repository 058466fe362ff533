use crate::api::AppState;
use crate::domain::auth::verify_jwt;
use crate::error::AppError;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use uuid::Uuid;

#[derive(Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts.headers.get(header::AUTHORIZATION).ok_or(AppError::AuthError)?;

        let auth_str = auth_header.to_str().map_err(|_| AppError::AuthError)?;
        let token = auth_str.strip_prefix("Bearer ").ok_or(AppError::AuthError)?;

        let claims = verify_jwt(token, state.auth_service.jwt_secret())?;

        Ok(Self { user_id: claims.sub })
    }
}
