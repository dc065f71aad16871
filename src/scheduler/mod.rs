//! Update scheduler module
//!
//! Drives the fetch cadence, the in-cycle retry policy for throttled
//! fetches, cache fallback, broadcast and notification.

mod retry;
mod updater;

pub use retry::{CyclePhase, RetryDecision, RetryPolicy};
pub use updater::{CycleReport, SnapshotOrigin, UpdateScheduler};

use crate::config::SchedulerConfig;
use std::time::Duration;

/// Timing and retry settings for the update loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Pause between cycles
    pub update_interval: Duration,
    /// Pause between throttled attempts within a cycle
    pub retry_pause: Duration,
    /// Throttled attempts retried before falling back to cache
    pub max_retries: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(60),
            retry_pause: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

impl From<&SchedulerConfig> for SchedulerSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            update_interval: Duration::from_secs(config.update_interval_secs),
            retry_pause: Duration::from_secs(config.retry_pause_secs),
            max_retries: config.max_retries,
        }
    }
}
