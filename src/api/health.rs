use crate::api::AppState;
use crate::error::Result;
use axum::{Json, extract::State};
use serde_json::{Value, json};

/// Liveness of the store and the bus.
///
/// # Errors
/// Returns `AppError::Storage` or `AppError::Internal` when a dependency is
/// unreachable.
pub async fn healthz(State(state): State<AppState>) -> Result<Json<Value>> {
    state.health_service.check().await?;
    Ok(Json(json!({ "status": "ok" })))
}
