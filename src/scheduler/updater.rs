//! Perpetual update loop

use super::{CyclePhase, RetryDecision, RetryPolicy, SchedulerSettings};
use crate::app::AppContext;
use crate::broadcast::PublishReport;
use crate::source::PriceSnapshot;
use crate::telemetry::{self, CounterMetric};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Where a cycle's effective snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// Fetched successfully this cycle
    Fresh,
    /// Fetch failed, served the cached snapshot
    Cached,
    /// Fetch failed and nothing was cached
    Failed,
}

/// Summary of one completed cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// 1-based cycle number
    pub cycle: u64,
    /// Snapshot that was broadcast
    pub snapshot: Arc<PriceSnapshot>,
    pub origin: SnapshotOrigin,
    /// Fetch attempts made during the cycle
    pub attempts: u32,
    pub publish: PublishReport,
    /// Whether a notification was dispatched
    pub notified: bool,
}

/// Drives fetch → cache → broadcast → notify on a fixed cadence
///
/// Only one scheduler runs per process; cycles never overlap.
pub struct UpdateScheduler {
    ctx: Arc<AppContext>,
    settings: SchedulerSettings,
    policy: RetryPolicy,
    phase: CyclePhase,
    cycles: u64,
    pending_notification: Option<JoinHandle<()>>,
}

impl UpdateScheduler {
    pub fn new(ctx: Arc<AppContext>, settings: SchedulerSettings) -> Self {
        let policy = RetryPolicy::new(settings.max_retries);
        Self {
            ctx,
            settings,
            policy,
            phase: CyclePhase::IdleWait,
            cycles: 0,
            pending_notification: None,
        }
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run cycles forever, sleeping `update_interval` between them
    ///
    /// Cancel by dropping the future; the cycle in progress is abandoned.
    pub async fn run(mut self) {
        tracing::info!(
            interval_secs = self.settings.update_interval.as_secs(),
            retry_pause_secs = self.settings.retry_pause.as_secs(),
            max_retries = self.settings.max_retries,
            "Price update loop started"
        );

        loop {
            let report = self.run_cycle().await;
            tracing::info!(
                cycle = report.cycle,
                origin = ?report.origin,
                attempts = report.attempts,
                delivered = report.publish.delivered,
                dropped = report.publish.failed.len(),
                "Price update sent"
            );

            self.phase = CyclePhase::IdleWait;
            sleep(self.settings.update_interval).await;
        }
    }

    /// Run one cycle: fetch (with throttling retries), update the cache,
    /// broadcast, and dispatch a notification when there are prices to report
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycles += 1;
        let mut attempts = 0;

        let (snapshot, origin) = loop {
            self.phase = CyclePhase::Fetching;
            attempts += 1;
            let result = Arc::new(self.ctx.source().fetch().await);

            match self.policy.on_outcome(&result) {
                RetryDecision::Retry { attempt } => {
                    telemetry::increment(CounterMetric::RetryAttempt);
                    let effective_backoff = self.ctx.source().throttle_pause() + self.settings.retry_pause;
                    tracing::warn!(
                        attempt,
                        max_retries = self.policy.max_retries(),
                        effective_backoff_secs = effective_backoff.as_secs(),
                        "Rate limited, retrying"
                    );
                    self.phase = CyclePhase::RetryWait;
                    sleep(self.settings.retry_pause).await;
                }
                RetryDecision::GiveUp => {
                    tracing::error!(attempts, "Max retries reached, using cached data");
                    break self.fallback(result).await;
                }
                RetryDecision::Proceed if result.is_success() => {
                    self.ctx.cache().set(result.clone()).await;
                    break (result, SnapshotOrigin::Fresh);
                }
                RetryDecision::Proceed => break self.fallback(result).await,
            }
        };

        self.phase = CyclePhase::Broadcasting;
        let publish = self.ctx.broadcaster().publish(&snapshot).await;

        let notified = snapshot.has_records() && self.ctx.sink().is_enabled();
        if notified {
            self.spawn_notification(snapshot.clone());
        }

        CycleReport {
            cycle: self.cycles,
            snapshot,
            origin,
            attempts,
            publish,
            notified,
        }
    }

    /// Wait for the most recently dispatched notification to finish
    pub async fn wait_for_notifications(&mut self) {
        if let Some(handle) = self.pending_notification.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Notification task panicked");
            }
        }
    }

    /// Cached snapshot if there is one, otherwise the failed result itself
    async fn fallback(&self, failed: Arc<PriceSnapshot>) -> (Arc<PriceSnapshot>, SnapshotOrigin) {
        match self.ctx.cache().get().await {
            Some(cached) => {
                telemetry::increment(CounterMetric::CacheFallback);
                tracing::warn!(
                    error = ?failed.error(),
                    cached_at = %cached.captured_at(),
                    "Fetch failed, serving cached snapshot"
                );
                (cached, SnapshotOrigin::Cached)
            }
            None => {
                tracing::warn!(error = ?failed.error(), "Fetch failed and no cached snapshot available");
                (failed, SnapshotOrigin::Failed)
            }
        }
    }

    /// Send the notification on its own task
    ///
    /// The cycle never waits on it. Each task first awaits the previous one,
    /// so sends from successive cycles never overlap.
    fn spawn_notification(&mut self, snapshot: Arc<PriceSnapshot>) {
        let sink = self.ctx.sink().clone();
        let previous = self.pending_notification.take();

        self.pending_notification = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    tracing::error!(error = %e, "Previous notification task panicked");
                }
            }

            match sink.send(&snapshot).await {
                Ok(()) => telemetry::increment(CounterMetric::NotificationSent),
                Err(e) => {
                    telemetry::increment(CounterMetric::NotificationFailed);
                    tracing::error!(error = %e, "Failed to send notification");
                }
            }
        }));
    }
}
