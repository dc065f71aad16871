//! Prometheus metrics

use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Upstream price request
    UpstreamFetch,
    /// One full publish pass over all subscribers
    Broadcast,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    FetchSuccess,
    FetchRateLimited,
    FetchUpstreamError,
    FetchTransportError,
    /// In-cycle retry after throttling
    RetryAttempt,
    /// Cycle served from cache instead of a fresh fetch
    CacheFallback,
    BroadcastDelivered,
    BroadcastFailed,
    NotificationSent,
    NotificationFailed,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Currently registered subscribers
    ConnectedSubscribers,
    /// Unix time of the last successful fetch
    LastSuccessTimestamp,
}

fn latency_name(metric: LatencyMetric) -> &'static str {
    match metric {
        LatencyMetric::UpstreamFetch => "pricerelay_upstream_fetch_latency_ms",
        LatencyMetric::Broadcast => "pricerelay_broadcast_latency_ms",
    }
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::FetchSuccess => "pricerelay_fetch_success_total",
        CounterMetric::FetchRateLimited => "pricerelay_fetch_rate_limited_total",
        CounterMetric::FetchUpstreamError => "pricerelay_fetch_upstream_error_total",
        CounterMetric::FetchTransportError => "pricerelay_fetch_transport_error_total",
        CounterMetric::RetryAttempt => "pricerelay_retry_attempts_total",
        CounterMetric::CacheFallback => "pricerelay_cache_fallback_total",
        CounterMetric::BroadcastDelivered => "pricerelay_broadcast_delivered_total",
        CounterMetric::BroadcastFailed => "pricerelay_broadcast_failed_total",
        CounterMetric::NotificationSent => "pricerelay_notification_sent_total",
        CounterMetric::NotificationFailed => "pricerelay_notification_failed_total",
    }
}

fn gauge_name(metric: GaugeMetric) -> &'static str {
    match metric {
        GaugeMetric::ConnectedSubscribers => "pricerelay_connected_subscribers",
        GaugeMetric::LastSuccessTimestamp => "pricerelay_last_success_timestamp_seconds",
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    metrics::histogram!(latency_name(metric)).record(duration.as_secs_f64() * 1000.0);
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    increment_by(metric, 1);
}

/// Increment a counter by `n`
pub fn increment_by(metric: CounterMetric, n: u64) {
    if n > 0 {
        metrics::counter!(counter_name(metric)).increment(n);
    }
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(gauge_name(metric)).set(value);
}
