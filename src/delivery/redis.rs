use crate::config::DeliveryConfig;
use crate::delivery::{BusMessage, DeliveryBus};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use dashmap::DashMap;
use futures::StreamExt;
use opentelemetry::{
    KeyValue, global,
    metrics::Counter,
};
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    publish_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("parley-server");
        Self {
            publish_total: meter
                .u64_counter("parley_bus_publish_total")
                .with_description("Total bus publish attempts by outcome")
                .build(),
        }
    }
}

/// Redis pub/sub implementation of the delivery bus.
///
/// One connection-manager publisher; one background listener per subscribed
/// pattern, reconnecting with exponential backoff.
#[derive(Debug)]
pub struct RedisBus {
    publisher: redis::aio::ConnectionManager,
    // Maps patterns (e.g. "topic/messages/*") to broadcast senders
    subscriptions: Arc<DashMap<String, broadcast::Sender<BusMessage>>>,
    client: redis::Client,
    shutdown: watch::Receiver<bool>,
    config: DeliveryConfig,
    metrics: Metrics,
}

impl RedisBus {
    /// Creates a new Redis-backed bus.
    ///
    /// # Errors
    /// Returns an error if the connection fails.
    pub async fn new(config: &DeliveryConfig, shutdown: watch::Receiver<bool>) -> anyhow::Result<Arc<Self>> {
        let client = redis::Client::open(config.pubsub_url.as_str())?;
        let publisher = client.get_connection_manager().await?;
        let subscriptions = Arc::new(DashMap::new());

        Ok(Arc::new(Self {
            publisher,
            subscriptions,
            client,
            shutdown,
            config: config.clone(),
            metrics: Metrics::new(),
        }))
    }

    async fn run_pattern_listener(
        client: redis::Client,
        pattern: String,
        tx: broadcast::Sender<BusMessage>,
        mut shutdown: watch::Receiver<bool>,
        subscriptions: Arc<DashMap<String, broadcast::Sender<BusMessage>>>,
        config: DeliveryConfig,
        ready_tx: tokio::sync::oneshot::Sender<()>,
    ) {
        let retry_strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs(config.min_backoff_secs))
            .with_max_delay(Duration::from_secs(config.max_backoff_secs));

        let mut ready_tx = Some(ready_tx);

        loop {
            let pubsub_result = (|| async {
                let mut pubsub = client.get_async_pubsub().await?;
                pubsub.psubscribe(&pattern).await?;
                Ok::<redis::aio::PubSub, redis::RedisError>(pubsub)
            })
            .retry(&retry_strategy)
            .when(|e| {
                tracing::warn!(error = %e, "Failed to subscribe to pubsub, retrying...");
                true
            })
            .notify(|e, duration| {
                tracing::debug!("Pubsub subscription retry in {:?} due to error: {:?}", duration, e);
            })
            .await;

            let pubsub: redis::aio::PubSub = match pubsub_result {
                Ok(ps) => ps,
                Err(e) => {
                    tracing::error!(error = %e, "Pubsub subscription failed after retries");
                    break;
                }
            };

            tracing::info!(pattern = %pattern, "Successfully subscribed to pubsub");
            if let Some(rtx) = ready_tx.take() {
                let _ = rtx.send(());
            }

            let mut message_stream = pubsub.into_on_message();

            loop {
                tokio::select! {
                    _ = shutdown.changed() => return,
                    msg = message_stream.next() => {
                        if let Some(msg) = msg {
                            let channel = msg.get_channel_name().to_string();
                            let span = tracing::trace_span!("bus_receive", %channel);

                            let bus_msg = span.in_scope(|| BusMessage {
                                channel,
                                payload: msg.get_payload().unwrap_or_default(),
                            });
                            // No local receiver right now; the update is simply
                            // not delivered.
                            let _ = tx.send(bus_msg);
                        } else {
                            tracing::warn!(pattern = %pattern, "Pubsub connection lost, reconnecting...");
                            break;
                        }
                    }
                }
            }

            if *shutdown.borrow() {
                break;
            }
        }

        subscriptions.remove(&pattern);
    }
}

#[async_trait]
impl DeliveryBus for RedisBus {
    #[tracing::instrument(level = "trace", skip(self, payload))]
    async fn publish(&self, topic: &str, payload: Vec<u8>) {
        let mut conn = self.publisher.clone();
        let timeout = Duration::from_millis(self.config.publish_timeout_ms);

        match tokio::time::timeout(timeout, conn.publish::<_, _, i64>(topic, payload)).await {
            Ok(Ok(_)) => {
                self.metrics.publish_total.add(1, &[KeyValue::new("status", "sent")]);
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, %topic, "Bus publish failed");
                self.metrics.publish_total.add(1, &[KeyValue::new("status", "error")]);
            }
            Err(_) => {
                tracing::warn!(%topic, "Bus publish timed out");
                self.metrics.publish_total.add(1, &[KeyValue::new("status", "timeout")]);
            }
        }
    }

    async fn subscribe(&self, pattern: &str) -> anyhow::Result<broadcast::Receiver<BusMessage>> {
        if let Some(tx) = self.subscriptions.get(pattern) {
            return Ok(tx.subscribe());
        }

        let (tx, rx) = broadcast::channel(self.config.bus_channel_capacity);
        self.subscriptions.insert(pattern.to_string(), tx.clone());

        let pattern_str = pattern.to_string();
        let client = self.client.clone();
        let shutdown = self.shutdown.clone();
        let subscriptions = Arc::clone(&self.subscriptions);
        let config = self.config.clone();

        // Wait for the first successful psubscribe before returning so no
        // publish slips past an unready listener.
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(
            async move {
                Self::run_pattern_listener(client, pattern_str, tx, shutdown, subscriptions, config, ready_tx)
                    .await;
            }
            .instrument(tracing::debug_span!("bus_listener", pattern = %pattern)),
        );

        let _ = ready_rx.await;

        Ok(rx)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.publisher.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}
