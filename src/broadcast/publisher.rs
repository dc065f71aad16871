//! Broadcast pipeline

use super::registry::{Delivery, Slot};
use super::{DeliveryError, Frame, Subscriber, SubscriberId, SubscriberRegistry};
use crate::cache::SnapshotCache;
use crate::source::PriceSnapshot;
use crate::telemetry::{self, CounterMetric, GaugeMetric, LatencyMetric};
use futures_util::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default per-subscriber send timeout
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of one publish pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that received the frame
    pub delivered: usize,
    /// Subscribers removed because their send failed
    pub failed: Vec<SubscriberId>,
}

/// Pushes snapshots to every registered subscriber
pub struct Broadcaster {
    registry: SubscriberRegistry,
    cache: Arc<SnapshotCache>,
    epoch: AtomicU64,
    send_timeout: Duration,
}

impl Broadcaster {
    pub fn new(cache: Arc<SnapshotCache>) -> Self {
        Self::with_send_timeout(cache, DEFAULT_SEND_TIMEOUT)
    }

    pub fn with_send_timeout(cache: Arc<SnapshotCache>, send_timeout: Duration) -> Self {
        Self {
            registry: SubscriberRegistry::new(),
            cache,
            epoch: AtomicU64::new(0),
            send_timeout,
        }
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Register a subscriber and push the cached snapshot to it right away
    ///
    /// If that first push fails the subscriber is removed again and the error
    /// returned.
    pub async fn connect(&self, subscriber: Arc<dyn Subscriber>) -> Result<SubscriberId, DeliveryError> {
        // Read the epoch before the cache: a publish racing with us carries a
        // higher epoch, so its frame wins over our possibly older cached one.
        let epoch = self.epoch.load(Ordering::Acquire);
        let (id, slot) = self.registry.insert(subscriber).await;
        let total = self.update_subscriber_gauge().await;
        tracing::info!(subscriber = %id, total, "Subscriber connected");

        let Some(snapshot) = self.cache.get().await else {
            return Ok(id);
        };

        let frame = match snapshot.to_json() {
            Ok(payload) => Frame::new(epoch, payload),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode cached snapshot");
                return Ok(id);
            }
        };

        if let Err(e) = self.deliver(&slot, &frame).await {
            tracing::warn!(subscriber = %id, error = %e, "Initial push failed, dropping subscriber");
            self.disconnect(id).await;
            slot.close();
            return Err(e);
        }

        Ok(id)
    }

    /// Remove a subscriber. Removing an unknown id is a no-op.
    pub async fn disconnect(&self, id: SubscriberId) {
        if self.registry.remove(id).await {
            let total = self.update_subscriber_gauge().await;
            tracing::info!(subscriber = %id, total, "Subscriber disconnected");
        }
    }

    /// Push `snapshot` to every subscriber registered when the call starts
    ///
    /// Subscribers whose send fails are removed once the whole pass is done
    /// and then told to close their transport; the rest still receive the
    /// frame.
    pub async fn publish(&self, snapshot: &PriceSnapshot) -> PublishReport {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let targets = self.registry.snapshot().await;

        if targets.is_empty() {
            tracing::debug!(epoch, "No subscribers to publish to");
            return PublishReport::default();
        }

        let frame = match snapshot.to_json() {
            Ok(payload) => Frame::new(epoch, payload),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode snapshot");
                return PublishReport::default();
            }
        };

        let started = Instant::now();
        let frame = &frame;
        let results = join_all(targets.iter().map(|(_, slot)| self.deliver(slot, frame))).await;
        telemetry::record_latency(LatencyMetric::Broadcast, started.elapsed());

        let mut report = PublishReport::default();
        let mut dropped = Vec::new();
        for ((id, slot), result) in targets.iter().zip(results) {
            match result {
                Ok(_) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(subscriber = %id, error = %e, "Send failed, removing subscriber");
                    report.failed.push(*id);
                    dropped.push(slot);
                }
            }
        }

        if !report.failed.is_empty() {
            self.registry.remove_all(&report.failed).await;
            self.update_subscriber_gauge().await;
            for slot in dropped {
                slot.close();
            }
        }

        telemetry::increment_by(CounterMetric::BroadcastDelivered, report.delivered as u64);
        telemetry::increment_by(CounterMetric::BroadcastFailed, report.failed.len() as u64);
        tracing::debug!(
            epoch,
            delivered = report.delivered,
            failed = report.failed.len(),
            "Published snapshot"
        );

        report
    }

    async fn deliver(&self, slot: &Slot, frame: &Frame) -> Result<Delivery, DeliveryError> {
        tokio::time::timeout(self.send_timeout, slot.deliver(frame))
            .await
            .unwrap_or(Err(DeliveryError::Timeout(self.send_timeout)))
    }

    /// Refresh the subscriber gauge and return the current count
    async fn update_subscriber_gauge(&self) -> usize {
        let total = self.registry.len().await;
        telemetry::set_gauge(GaugeMetric::ConnectedSubscribers, total as f64);
        total
    }
}
