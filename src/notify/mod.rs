//! Out-of-band notifications
//!
//! Sinks receive successful snapshots and deliver a digest somewhere else
//! (Telegram). Delivery is best effort: callers log errors and move on.

mod telegram;

pub use telegram::{format_digest, format_usd, round_cents, TelegramConfig, TelegramSink, TELEGRAM_API_URL};

use crate::config::NotifyConfig;
use crate::source::PriceSnapshot;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Notification delivery errors
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Request could not be sent or its response not read
    #[error("Notification request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Remote API rejected the message
    #[error("Notification rejected ({status}): {description}")]
    Rejected { status: u16, description: String },
    /// Snapshot had nothing to report
    #[error("Snapshot has no prices to report")]
    EmptySnapshot,
}

/// Trait for notification sink implementations
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a digest of a success snapshot
    async fn send(&self, snapshot: &PriceSnapshot) -> Result<(), NotifyError>;

    /// Disabled sinks are skipped entirely
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Sink used when no channel is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSink;

#[async_trait]
impl NotificationSink for DisabledSink {
    async fn send(&self, _snapshot: &PriceSnapshot) -> Result<(), NotifyError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Build the sink described by `config`
///
/// Missing bot token or chat id disables notifications without error.
pub fn sink_from_config(config: &NotifyConfig) -> anyhow::Result<Arc<dyn NotificationSink>> {
    match (&config.telegram_bot_token, &config.telegram_chat_id) {
        (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
            let sink = TelegramSink::new(TelegramConfig {
                api_base: config.telegram_api_url.clone(),
                bot_token: token.clone(),
                chat_id: chat_id.clone(),
                timeout: std::time::Duration::from_secs(config.timeout_secs),
            })?;
            tracing::info!(chat_id = %chat_id, "Telegram notifications enabled");
            Ok(Arc::new(sink))
        }
        _ => {
            tracing::info!("Telegram not configured, notifications disabled");
            Ok(Arc::new(DisabledSink))
        }
    }
}
