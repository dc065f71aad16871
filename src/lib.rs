//! price-relay: crypto price relay for WebSocket subscribers
//!
//! This library provides the core components for:
//! - Polling CoinGecko for a fixed instrument set
//! - Caching the last successful snapshot
//! - A fixed-cadence update loop with in-cycle retry of throttled fetches
//! - Fan-out of snapshots to WebSocket subscribers
//! - Telegram digests of each update
//! - Logging and Prometheus metrics

pub mod app;
pub mod broadcast;
pub mod cache;
pub mod cli;
pub mod config;
pub mod notify;
pub mod scheduler;
pub mod source;
pub mod telemetry;
pub mod ws;
