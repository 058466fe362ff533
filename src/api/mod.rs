use crate::config::Config;
use crate::services::{AuthService, ContactService, DeliveryService, HealthService, MessageService};
use axum::body::Body;
use axum::http::Request;
use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod contacts;
pub mod dto;
pub mod gateway;
pub mod health;
pub mod messages;
pub mod middleware;
pub mod profile;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub auth_service: AuthService,
    pub message_service: MessageService,
    pub contact_service: ContactService,
    pub delivery_service: DeliveryService,
    pub health_service: HealthService,
    pub shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

/// Configures and returns the application router.
///
/// # Panics
/// Panics if the rate limiter configuration cannot be constructed.
#[must_use]
pub fn app_router(state: AppState) -> Router {
    let rate_limit = &state.config.rate_limit;

    let std_interval_ns = 1_000_000_000 / rate_limit.per_second.max(1);
    let standard_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(std_interval_ns))
            .burst_size(rate_limit.burst)
            .finish()
            .expect("Failed to build standard rate limiter config"),
    );

    // Stricter tier for the expensive registration and login endpoints
    let auth_interval_ns = 1_000_000_000 / rate_limit.auth_per_second.max(1);
    let auth_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(auth_interval_ns))
            .burst_size(rate_limit.auth_burst)
            .finish()
            .expect("Failed to build auth rate limiter config"),
    );

    let auth_routes = Router::new()
        .route("/users", post(auth::register))
        .route("/sessions", post(auth::login))
        .layer(GovernorLayer::new(auth_conf));

    let api_routes = Router::new()
        .route("/profile", get(profile::get_profile).put(profile::update_profile))
        .route("/users/search", get(contacts::search_users))
        .route("/messages", post(messages::send_message))
        .route("/messages/{contactId}", get(messages::get_conversation))
        .route("/messages/{contactId}/read", post(messages::mark_read))
        .route("/contacts", post(contacts::add_contact))
        .route("/contacts/{contactId}", delete(contacts::remove_contact))
        .route("/gateway", get(gateway::websocket_handler))
        .layer(GovernorLayer::new(standard_conf));

    let request_timeout = std::time::Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route("/healthz", get(health::healthz))
        .nest("/v1", auth_routes.merge(api_routes))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .extensions()
                .get::<tower_http::request_id::RequestId>()
                .and_then(|id| id.header_value().to_str().ok())
                .unwrap_or_default()
                .to_string();

            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                %request_id,
            )
        }))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
