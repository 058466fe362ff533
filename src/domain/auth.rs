use crate::error::{AppError, Result};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

/// A freshly issued login session.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: i64,
    pub user_id: Uuid,
}

/// Issues a signed access token for `user_id` valid for `ttl_secs`.
///
/// # Errors
/// Returns `AppError::Internal` if token encoding fails.
pub fn issue_jwt(user_id: Uuid, ttl_secs: u64, secret: &str) -> Result<(String, i64)> {
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(std::time::Duration::from_secs(0))
        .as_secs()
        .saturating_add(ttl_secs) as usize;

    let claims = Claims { sub: user_id, exp };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|_| AppError::Internal)?;

    Ok((token, exp as i64))
}

/// Verifies a token's signature and expiry.
///
/// # Errors
/// Returns `AppError::AuthError` on any invalid or expired token.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| AppError::AuthError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_round_trip() {
        let user_id = Uuid::new_v4();
        let (token, exp) = issue_jwt(user_id, 60, "secret").expect("issue");

        let claims = verify_jwt(&token, "secret").expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.exp as i64, exp);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (token, _) = issue_jwt(Uuid::new_v4(), 60, "secret").expect("issue");
        assert!(verify_jwt(&token, "other").is_err());
    }
}
