use crate::config::AuthConfig;
use crate::domain::auth::{AuthSession, issue_jwt};
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::storage::DbPool;
use crate::storage::user_repo::UserRepository;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use opentelemetry::{global, metrics::Counter};
use rand::rngs::OsRng;

#[derive(Clone, Debug)]
struct Metrics {
    register_total: Counter<u64>,
    login_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("parley-server");
        Self {
            register_total: meter
                .u64_counter("parley_auth_register_total")
                .with_description("Total successful registrations")
                .build(),
            login_total: meter
                .u64_counter("parley_auth_login_total")
                .with_description("Total successful logins")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthService {
    config: AuthConfig,
    pool: DbPool,
    users: UserRepository,
    metrics: Metrics,
}

impl AuthService {
    #[must_use]
    pub fn new(config: AuthConfig, pool: DbPool, users: UserRepository) -> Self {
        Self { config, pool, users, metrics: Metrics::new() }
    }

    /// Registers a new account.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` on malformed input and
    /// `AppError::Conflict` when the username or email is taken.
    #[tracing::instrument(err(level = "warn"), skip(self, username, email, password))]
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User> {
        if username.trim().is_empty() || username.len() > 64 {
            return Err(AppError::BadRequest("Username must be between 1 and 64 characters".to_string()));
        }
        if !email.contains('@') {
            return Err(AppError::BadRequest("Invalid email address".to_string()));
        }
        if password.len() < 8 {
            return Err(AppError::BadRequest("Password must be at least 8 characters".to_string()));
        }

        let password_hash = self.hash_password(password).await?;

        let mut conn = self.pool.acquire().await?;
        let user = self.users.create(&mut conn, username.trim(), email.trim(), &password_hash).await?;

        self.metrics.register_total.add(1, &[]);
        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Logs in by username or email (case-insensitive).
    ///
    /// # Errors
    /// Returns `AppError::AuthError` for unknown identifiers and bad
    /// passwords alike.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, identifier, password),
        fields(user_id = tracing::field::Empty)
    )]
    pub async fn login(&self, identifier: &str, password: &str) -> Result<AuthSession> {
        let mut conn = self.pool.acquire().await?;

        let Some(user) = self.users.resolve(&mut conn, identifier).await? else {
            tracing::debug!("Login failed: user not found");
            return Err(AppError::AuthError);
        };

        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        if !self.verify_password(password, &user.password_hash).await? {
            tracing::debug!("Login failed: invalid password");
            return Err(AppError::AuthError);
        }

        let (token, expires_at) =
            issue_jwt(user.id, self.config.access_token_ttl_secs, &self.config.jwt_secret)?;

        self.metrics.login_total.add(1, &[]);
        Ok(AuthSession { token, expires_at, user_id: user.id })
    }

    /// # Errors
    /// Returns `AppError::Internal` if hashing fails.
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            let argon2 = Argon2::default();
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map_err(|_| AppError::Internal)
                .map(|h| h.to_string())
        })
        .await
        .map_err(|_| AppError::Internal)?
    }

    /// # Errors
    /// Returns `AppError::Internal` if the stored hash cannot be parsed.
    pub async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        tokio::task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash).map_err(|_| AppError::Internal)?;
            Ok(Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok())
        })
        .await
        .map_err(|_| AppError::Internal)?
    }

    #[must_use]
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt_secret
    }
}
