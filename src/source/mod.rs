//! Price source module
//!
//! Fetches quotes for a fixed instrument set and normalizes them into a
//! [`PriceSnapshot`]

mod coingecko;
mod types;
mod wire;

pub use coingecko::{CoinGeckoConfig, CoinGeckoSource, COINGECKO_API_URL};
pub use types::{FetchError, PriceRecord, PriceSnapshot};
pub use wire::WireSnapshot;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// A tracked asset: upstream id plus display symbol and name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instrument {
    /// Upstream identifier (e.g., "bitcoin")
    pub id: String,
    /// Ticker symbol (e.g., "BTC")
    pub symbol: String,
    /// Display name (e.g., "Bitcoin")
    pub name: String,
}

impl Instrument {
    /// Create an instrument whose display name is the capitalized id
    pub fn new(id: impl Into<String>, symbol: impl Into<String>) -> Self {
        let id = id.into();
        let name = capitalize(&id);
        Self {
            id,
            symbol: symbol.into(),
            name,
        }
    }

    /// Override the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bitcoin, Ethereum and Solana
    pub fn defaults() -> Vec<Instrument> {
        vec![
            Instrument::new("bitcoin", "BTC"),
            Instrument::new("ethereum", "ETH"),
            Instrument::new("solana", "SOL"),
        ]
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Trait for price source implementations
///
/// `fetch` never fails: every failure mode is encoded as
/// [`PriceSnapshot::Failed`] with a typed [`FetchError`].
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch one snapshot covering every instrument
    async fn fetch(&self) -> PriceSnapshot;

    /// Instruments this source reports on
    fn instruments(&self) -> &[Instrument];

    /// Pause `fetch` itself applies before returning a rate-limited result
    fn throttle_pause(&self) -> Duration {
        Duration::ZERO
    }

    /// Release network resources. Called once on shutdown.
    async fn close(&self) {}
}
