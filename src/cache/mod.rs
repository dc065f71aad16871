//! Last-good snapshot cache

use crate::source::PriceSnapshot;
use crate::telemetry::{self, GaugeMetric};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Holds the most recent successful snapshot
///
/// Empty until the first successful fetch, never empty again afterwards.
/// Failure snapshots are ignored.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    latest: RwLock<Option<Arc<PriceSnapshot>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent successful snapshot, if any
    pub async fn get(&self) -> Option<Arc<PriceSnapshot>> {
        self.latest.read().await.clone()
    }

    /// Store a snapshot. Returns `false` (and leaves the cache untouched) for
    /// failure snapshots.
    pub async fn set(&self, snapshot: Arc<PriceSnapshot>) -> bool {
        if !snapshot.is_success() {
            tracing::debug!("Ignoring failed snapshot for cache");
            return false;
        }

        telemetry::set_gauge(
            GaugeMetric::LastSuccessTimestamp,
            snapshot.captured_at().timestamp() as f64,
        );
        *self.latest.write().await = Some(snapshot);
        true
    }

    pub async fn is_empty(&self) -> bool {
        self.latest.read().await.is_none()
    }
}
