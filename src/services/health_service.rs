use crate::delivery::DeliveryBus;
use crate::error::{AppError, Result};
use crate::storage::DbPool;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct HealthService {
    pool: DbPool,
    bus: Arc<dyn DeliveryBus>,
}

impl HealthService {
    #[must_use]
    pub fn new(pool: DbPool, bus: Arc<dyn DeliveryBus>) -> Self {
        Self { pool, bus }
    }

    /// Verifies the store and the bus are reachable.
    ///
    /// # Errors
    /// Returns `AppError::Storage` or `AppError::Internal` on failure.
    pub async fn check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        self.bus.ping().await.map_err(|e| {
            tracing::warn!(error = %e, "Bus health check failed");
            AppError::Internal
        })?;
        Ok(())
    }
}
