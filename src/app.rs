//! Application context shared by the scheduler and every connection

use crate::broadcast::Broadcaster;
use crate::cache::SnapshotCache;
use crate::config::Config;
use crate::notify::{self, NotificationSink};
use crate::source::{CoinGeckoSource, PriceSource};
use std::sync::Arc;
use std::time::Duration;

/// Owns the price source, cache, broadcaster and notification sink
///
/// Built once at startup and passed around behind an `Arc`.
pub struct AppContext {
    source: Arc<dyn PriceSource>,
    cache: Arc<SnapshotCache>,
    broadcaster: Broadcaster,
    sink: Arc<dyn NotificationSink>,
}

impl AppContext {
    pub fn new(source: Arc<dyn PriceSource>, sink: Arc<dyn NotificationSink>) -> Self {
        let cache = Arc::new(SnapshotCache::new());
        let broadcaster = Broadcaster::new(cache.clone());
        Self {
            source,
            cache,
            broadcaster,
            sink,
        }
    }

    /// Like [`AppContext::new`] with a custom per-subscriber send timeout
    pub fn with_send_timeout(
        source: Arc<dyn PriceSource>,
        sink: Arc<dyn NotificationSink>,
        send_timeout: Duration,
    ) -> Self {
        let cache = Arc::new(SnapshotCache::new());
        let broadcaster = Broadcaster::with_send_timeout(cache.clone(), send_timeout);
        Self {
            source,
            cache,
            broadcaster,
            sink,
        }
    }

    /// Build the CoinGecko source and notification sink from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let source = CoinGeckoSource::with_config(config.source.client_config(), config.source.instruments());
        let sink = notify::sink_from_config(&config.notify)?;
        Ok(Self::with_send_timeout(
            Arc::new(source),
            sink,
            Duration::from_secs(config.server.send_timeout_secs),
        ))
    }

    pub fn source(&self) -> &Arc<dyn PriceSource> {
        &self.source
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn sink(&self) -> &Arc<dyn NotificationSink> {
        &self.sink
    }

    /// Release network resources held by the price source
    pub async fn shutdown(&self) {
        self.source.close().await;
        tracing::info!("Shutdown complete");
    }
}
