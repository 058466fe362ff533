use crate::config::MessagingConfig;
use crate::error::AppError;
use crate::storage::DbPool;
use crate::storage::message_repo::MessageRepository;
use opentelemetry::{global, metrics::Counter};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    purged_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("parley-server");
        Self {
            purged_total: meter
                .u64_counter("parley_messages_purged_total")
                .with_description("Total messages deleted by the retention purge")
                .build(),
        }
    }
}

/// Deletes messages older than the retention window on a fixed interval.
/// Runs off the request path; concurrent hide/mark-read on purged rows are
/// harmless no-ops.
#[derive(Debug)]
pub struct MessagePurgeWorker {
    pool: DbPool,
    repo: MessageRepository,
    config: MessagingConfig,
    metrics: Metrics,
}

impl MessagePurgeWorker {
    #[must_use]
    pub fn new(pool: DbPool, repo: MessageRepository, config: MessagingConfig) -> Self {
        Self { pool, repo, config, metrics: Metrics::new() }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.purge_interval_secs));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.perform_purge()
                        .instrument(tracing::info_span!("message_purge_iteration"))
                        .await
                    {
                        tracing::error!(error = ?e, "Message purge iteration failed");
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Message purge loop shutting down...");
    }

    /// Deletes everything older than the retention window.
    ///
    /// # Errors
    /// Returns an error if the database connection or query fails.
    #[tracing::instrument(skip(self), err, fields(purged = tracing::field::Empty))]
    pub async fn perform_purge(&self) -> Result<(), AppError> {
        let cutoff = OffsetDateTime::now_utc() - time::Duration::hours(self.config.retention_hours);

        let mut conn = self.pool.acquire().await?;
        let count = self.repo.purge_older_than(&mut conn, cutoff).await?;

        if count > 0 {
            tracing::info!(count = %count, "Purged expired messages");
            self.metrics.purged_total.add(count, &[]);
            tracing::Span::current().record("purged", count);
        }

        Ok(())
    }
}
