use crate::config::DeliveryConfig;
use crate::delivery::{BusMessage, DeliveryBus, LiveUpdate, topic};
use crate::domain::contact::ContactSummary;
use crate::domain::message::Message;
use crate::domain::user::Profile;
use dashmap::DashMap;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, UpDownCounter},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    received_total: Counter<u64>,
    unrouted_total: Counter<u64>,
    active_channels: UpDownCounter<i64>,
    gc_duration_seconds: Histogram<f64>,
    gc_reclaimed_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("parley-server");
        Self {
            received_total: meter
                .u64_counter("parley_updates_received_total")
                .with_description("Total live updates received from the bus")
                .build(),
            unrouted_total: meter
                .u64_counter("parley_updates_unrouted_total")
                .with_description("Live updates received with no local subscriber")
                .build(),
            active_channels: meter
                .i64_up_down_counter("parley_live_channels")
                .with_description("Number of active local live-update channels")
                .build(),
            gc_duration_seconds: meter
                .f64_histogram("parley_channel_gc_duration_seconds")
                .with_description("Time taken to perform a single channel GC iteration")
                .build(),
            gc_reclaimed_total: meter
                .u64_counter("parley_channels_reclaimed_total")
                .with_description("Total stale live-update channels reclaimed by GC")
                .build(),
        }
    }
}

/// Fans live updates out to connected clients.
///
/// Outbound, this is the single place that maps domain payloads onto the
/// wire topics; inbound, it routes bus traffic into per-user broadcast
/// channels consumed by gateway sessions.
#[derive(Clone, Debug)]
pub struct DeliveryService {
    bus: Arc<dyn DeliveryBus>,
    channels: Arc<DashMap<Uuid, broadcast::Sender<LiveUpdate>>>,
    user_channel_capacity: usize,
    metrics: Metrics,
}

impl DeliveryService {
    #[must_use]
    pub fn new(bus: Arc<dyn DeliveryBus>, config: &DeliveryConfig) -> Self {
        Self {
            bus,
            channels: Arc::new(DashMap::new()),
            user_channel_capacity: config.user_channel_capacity,
            metrics: Metrics::new(),
        }
    }

    /// Publishes a freshly appended message to both directed conversation
    /// topics so either party's subscription sees it.
    pub async fn publish_message(&self, message: &Message) {
        let Some(payload) = encode(message) else { return };
        self.bus.publish(&topic::conversation(message.sender_id, message.recipient_id), payload.clone()).await;
        self.bus.publish(&topic::conversation(message.recipient_id, message.sender_id), payload).await;
    }

    /// Publishes a contact summary reflecting a message or unread change.
    pub async fn publish_summary(&self, owner: Uuid, summary: &ContactSummary) {
        let Some(payload) = encode(summary) else { return };
        self.bus.publish(&topic::summaries(owner), payload).await;
    }

    /// Publishes a contact summary for an added contact or a changed
    /// profile.
    pub async fn publish_contact_update(&self, owner: Uuid, summary: &ContactSummary) {
        let Some(payload) = encode(summary) else { return };
        self.bus.publish(&topic::contacts(owner), payload).await;
    }

    /// Tells the owner which contact left their list.
    pub async fn publish_contact_removed(&self, owner: Uuid, removed: &Profile) {
        let Some(payload) = encode(removed) else { return };
        self.bus.publish(&topic::contact_removed(owner), payload).await;
    }

    /// Routes a bus message to the owning user's local channel, if any.
    pub fn dispatch(&self, message: BusMessage) {
        let Some(owner) = topic::owner_of(&message.channel) else {
            tracing::debug!(channel = %message.channel, "Dropping bus message with unroutable channel");
            return;
        };

        self.metrics.received_total.add(1, &[]);

        if let Some(tx) = self.channels.get(&owner) {
            tracing::trace!(%owner, channel = %message.channel, "Dispatched live update to local channel");
            let _ = tx.send(LiveUpdate { topic: message.channel, payload: message.payload });
        } else {
            tracing::trace!(%owner, channel = %message.channel, "No local subscriber for live update");
            self.metrics.unrouted_total.add(1, &[KeyValue::new("kind", "no_subscriber")]);
        }
    }

    /// Subscribes a gateway session to a user's live updates.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub fn subscribe(&self, user_id: Uuid) -> broadcast::Receiver<LiveUpdate> {
        let tx = self
            .channels
            .entry(user_id)
            .or_insert_with(|| {
                self.metrics.active_channels.add(1, &[]);
                let (tx, _rx) = broadcast::channel(self.user_channel_capacity);
                tx
            })
            .value()
            .clone();

        tx.subscribe()
    }

    /// Reclaims channels whose last receiver is gone.
    pub fn perform_gc(&self) {
        let start = std::time::Instant::now();
        let mut reclaimed_this_cycle = 0;

        self.channels.retain(|_, sender| {
            let active = sender.receiver_count() > 0;
            if !active {
                self.metrics.active_channels.add(-1, &[]);
                reclaimed_this_cycle += 1;
            }
            active
        });

        let duration = start.elapsed().as_secs_f64();
        self.metrics.gc_duration_seconds.record(duration, &[]);

        if reclaimed_this_cycle > 0 {
            self.metrics.gc_reclaimed_total.add(reclaimed_this_cycle, &[]);
            tracing::debug!(reclaimed = reclaimed_this_cycle, "Live-update channel GC reclaimed stale channels");
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Option<Vec<u8>> {
    match serde_json::to_vec(value) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode live-update payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeliveryConfig;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct NullBus;

    #[async_trait]
    impl DeliveryBus for NullBus {
        async fn publish(&self, _topic: &str, _payload: Vec<u8>) {}

        async fn subscribe(&self, _pattern: &str) -> anyhow::Result<broadcast::Receiver<BusMessage>> {
            let (_tx, rx) = broadcast::channel(1);
            Ok(rx)
        }

        async fn ping(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn test_config() -> DeliveryConfig {
        DeliveryConfig {
            pubsub_url: "redis://127.0.0.1:6379".to_string(),
            publish_timeout_ms: 250,
            bus_channel_capacity: 16,
            user_channel_capacity: 16,
            gc_interval_secs: 60,
            min_backoff_secs: 1,
            max_backoff_secs: 30,
        }
    }

    #[tokio::test]
    async fn dispatch_routes_to_the_owning_user_only() {
        let service = DeliveryService::new(Arc::new(NullBus), &test_config());

        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut owner_rx = service.subscribe(owner);
        let mut other_rx = service.subscribe(other);

        service.dispatch(BusMessage { channel: topic::summaries(owner), payload: b"{}".to_vec() });

        let update = owner_rx.recv().await.expect("owner update");
        assert_eq!(update.topic, topic::summaries(owner));
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dispatch_without_subscriber_is_a_no_op() {
        let service = DeliveryService::new(Arc::new(NullBus), &test_config());
        service.dispatch(BusMessage { channel: topic::summaries(Uuid::new_v4()), payload: b"{}".to_vec() });
    }

    #[tokio::test]
    async fn gc_reclaims_channels_with_no_receivers() {
        let service = DeliveryService::new(Arc::new(NullBus), &test_config());

        let stale = Uuid::new_v4();
        let active = Uuid::new_v4();
        let stale_rx = service.subscribe(stale);
        let _active_rx = service.subscribe(active);

        drop(stale_rx);
        assert_eq!(service.channels.len(), 2);

        service.perform_gc();

        assert_eq!(service.channels.len(), 1);
        assert!(service.channels.contains_key(&active));
        assert!(!service.channels.contains_key(&stale));
    }
}
