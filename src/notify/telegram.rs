//! Telegram Bot API sink

use super::{NotificationSink, NotifyError};
use crate::source::PriceSnapshot;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::time::Duration;

/// Telegram Bot API base URL
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Configuration for the Telegram sink
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_base: String,
    pub bot_token: String,
    /// Target chat or channel
    pub chat_id: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    description: Option<String>,
}

/// Posts a Markdown price digest to a Telegram chat
pub struct TelegramSink {
    config: TelegramConfig,
    client: Client,
}

impl TelegramSink {
    pub fn new(config: TelegramConfig) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        )
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, snapshot: &PriceSnapshot) -> Result<(), NotifyError> {
        let text = format_digest(snapshot).ok_or(NotifyError::EmptySnapshot)?;

        let response = self
            .client
            .post(self.endpoint())
            .json(&SendMessage {
                chat_id: &self.config.chat_id,
                text: &text,
                parse_mode: "Markdown",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let description = response
                .json::<ApiResponse>()
                .await
                .ok()
                .and_then(|r| r.description)
                .unwrap_or_else(|| status.to_string());
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                description,
            });
        }

        tracing::info!(chat_id = %self.config.chat_id, "Telegram message sent");
        Ok(())
    }
}

/// Render the Markdown digest for a success snapshot
///
/// Returns `None` for failure snapshots and snapshots without records.
pub fn format_digest(snapshot: &PriceSnapshot) -> Option<String> {
    let records = snapshot.records().filter(|r| !r.is_empty())?;

    let mut message = String::from("🚀 *Crypto Price Update* 🚀\n\n");
    for record in records.values() {
        let rising = record.change_24h >= Decimal::ZERO;
        let emoji = if rising { "📈" } else { "📉" };
        let sign = if rising { "+" } else { "" };

        let _ = write!(
            message,
            "{} *{}*: ${}\n   24h: {}{:.2}%\n\n",
            emoji,
            record.symbol,
            format_usd(record.price),
            sign,
            round_cents(record.change_24h)
        );
    }
    let _ = write!(
        message,
        "⏰ Updated: {}",
        snapshot.captured_at().format("%Y-%m-%d %H:%M:%S UTC")
    );

    Some(message)
}

/// Round to two decimals, halves away from zero
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Two decimals with thousands separators, e.g. `50,000.00`
pub fn format_usd(value: Decimal) -> String {
    let rounded = round_cents(value);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}{}.{}", sign, grouped, frac_part)
}
