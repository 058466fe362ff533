use crate::config::DeliveryConfig;
use crate::delivery::{DeliveryBus, topic};
use crate::services::delivery_service::DeliveryService;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{StreamExt, StreamMap};

/// Bridges the bus into local gateway sessions.
///
/// Subscribes once per topic family and routes every received update into
/// the per-user channels; also runs the periodic channel GC.
#[derive(Debug)]
pub struct FanoutWorker {
    bus: Arc<dyn DeliveryBus>,
    delivery: DeliveryService,
    config: DeliveryConfig,
}

impl FanoutWorker {
    #[must_use]
    pub fn new(bus: Arc<dyn DeliveryBus>, delivery: DeliveryService, config: DeliveryConfig) -> Self {
        Self { bus, delivery, config }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut streams = StreamMap::new();
        for pattern in [topic::MESSAGES_PATTERN, topic::CONTACTS_PATTERN] {
            match self.bus.subscribe(pattern).await {
                Ok(rx) => {
                    streams.insert(pattern, BroadcastStream::new(rx));
                }
                Err(e) => {
                    tracing::error!(error = %e, %pattern, "Failed to subscribe to bus; fan-out disabled");
                    return;
                }
            }
        }

        let mut gc_interval = tokio::time::interval(Duration::from_secs(self.config.gc_interval_secs));

        loop {
            tokio::select! {
                Some((pattern, received)) = streams.next() => match received {
                    Ok(message) => self.delivery.dispatch(message),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        // Dropped updates are not replayed; clients re-sync
                        // from storage.
                        tracing::warn!(%pattern, skipped, "Fan-out lagged behind the bus");
                    }
                },
                _ = gc_interval.tick() => self.delivery.perform_gc(),
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Fan-out loop shutting down...");
    }
}
