//! Shared test doubles

use async_trait::async_trait;
use price_relay::source::{FetchError, Instrument, PriceRecord, PriceSnapshot, PriceSource};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// Source that replays a queue of snapshots, then reports transport errors
pub struct ScriptedSource {
    instruments: Vec<Instrument>,
    script: Mutex<VecDeque<PriceSnapshot>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<PriceSnapshot>) -> Self {
        Self {
            instruments: vec![Instrument::new("bitcoin", "BTC")],
            script: Mutex::new(script.into()),
        }
    }
}

#[async_trait]
impl PriceSource for ScriptedSource {
    async fn fetch(&self) -> PriceSnapshot {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| PriceSnapshot::failed(FetchError::Transport("script exhausted".into())))
    }

    fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }
}

/// Success snapshot with a single BTC record
pub fn btc(price: Decimal) -> PriceSnapshot {
    let mut records = BTreeMap::new();
    records.insert(
        "bitcoin".to_string(),
        PriceRecord {
            name: "Bitcoin".to_string(),
            symbol: "BTC".to_string(),
            price,
            change_24h: Decimal::ZERO,
            last_updated: 1704067200,
        },
    );
    PriceSnapshot::prices(records)
}
