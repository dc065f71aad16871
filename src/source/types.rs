//! Price snapshot types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a fetch produced no prices
///
/// This is a closed set: retry decisions branch on the variant, never on the
/// rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Upstream signaled throttling (HTTP 429 or an in-body 429 error code)
    #[error("Rate limited by upstream")]
    RateLimited,
    /// Upstream answered with a non-success status other than throttling
    #[error("Upstream returned status {status}")]
    Upstream { status: u16 },
    /// The request did not complete, the body could not be decoded, or it
    /// carried none of the requested instruments
    #[error("Transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::RateLimited => "rate_limited",
            FetchError::Upstream { .. } => "upstream",
            FetchError::Transport(_) => "transport",
        }
    }
}

/// Normalized quote for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Display name (e.g., "Bitcoin")
    pub name: String,
    /// Ticker symbol (e.g., "BTC")
    pub symbol: String,
    /// Price in the quote currency, never negative
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// 24-hour change in percent
    #[serde(with = "rust_decimal::serde::float")]
    pub change_24h: Decimal,
    /// Upstream last-updated time, unix seconds
    pub last_updated: i64,
}

/// One point-in-time capture: either prices for every instrument, or an error
#[derive(Debug, Clone, PartialEq)]
pub enum PriceSnapshot {
    Prices {
        captured_at: DateTime<Utc>,
        /// Keyed by instrument id
        records: BTreeMap<String, PriceRecord>,
    },
    Failed {
        captured_at: DateTime<Utc>,
        error: FetchError,
    },
}

impl PriceSnapshot {
    /// Success snapshot captured now
    pub fn prices(records: BTreeMap<String, PriceRecord>) -> Self {
        PriceSnapshot::Prices {
            captured_at: Utc::now(),
            records,
        }
    }

    /// Failure snapshot captured now
    pub fn failed(error: FetchError) -> Self {
        PriceSnapshot::Failed {
            captured_at: Utc::now(),
            error,
        }
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        match self {
            PriceSnapshot::Prices { captured_at, .. } | PriceSnapshot::Failed { captured_at, .. } => {
                *captured_at
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PriceSnapshot::Prices { .. })
    }

    /// Success variant with at least one record
    pub fn has_records(&self) -> bool {
        self.records().is_some_and(|r| !r.is_empty())
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self.error(), Some(FetchError::RateLimited))
    }

    pub fn records(&self) -> Option<&BTreeMap<String, PriceRecord>> {
        match self {
            PriceSnapshot::Prices { records, .. } => Some(records),
            PriceSnapshot::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            PriceSnapshot::Prices { .. } => None,
            PriceSnapshot::Failed { error, .. } => Some(error),
        }
    }
}
