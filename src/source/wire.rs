//! JSON encoding pushed to subscribers
//!
//! Success: `{"timestamp": "...", "prices": {"bitcoin": {...}}}`
//! Failure: `{"error": "..."}`

use super::{PriceRecord, PriceSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireSnapshot {
    Prices {
        timestamp: DateTime<Utc>,
        prices: BTreeMap<String, PriceRecord>,
    },
    Error {
        error: String,
    },
}

impl From<&PriceSnapshot> for WireSnapshot {
    fn from(snapshot: &PriceSnapshot) -> Self {
        match snapshot {
            PriceSnapshot::Prices {
                captured_at,
                records,
            } => WireSnapshot::Prices {
                timestamp: *captured_at,
                prices: records.clone(),
            },
            PriceSnapshot::Failed { error, .. } => WireSnapshot::Error {
                error: error.to_string(),
            },
        }
    }
}

impl PriceSnapshot {
    /// Encode into the subscriber wire format
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&WireSnapshot::from(self))
    }
}

impl WireSnapshot {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FetchError;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn btc_snapshot() -> PriceSnapshot {
        let mut records = BTreeMap::new();
        records.insert(
            "bitcoin".to_string(),
            PriceRecord {
                name: "Bitcoin".to_string(),
                symbol: "BTC".to_string(),
                price: dec!(50000),
                change_24h: dec!(-2.5),
                last_updated: 1704067200,
            },
        );
        PriceSnapshot::Prices {
            captured_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            records,
        }
    }

    #[test]
    fn test_success_encoding_shape() {
        let json = btc_snapshot().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["timestamp"], "2024-01-01T00:00:00Z");
        let btc = &value["prices"]["bitcoin"];
        assert_eq!(btc["name"], "Bitcoin");
        assert_eq!(btc["symbol"], "BTC");
        assert_eq!(btc["price"].as_f64(), Some(50000.0));
        assert_eq!(btc["change_24h"].as_f64(), Some(-2.5));
        assert_eq!(btc["last_updated"], 1704067200);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_failure_encoding_has_no_prices() {
        let json = PriceSnapshot::failed(FetchError::Upstream { status: 502 })
            .to_json()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["error"], "Upstream returned status 502");
        assert!(value.get("prices").is_none());
        assert!(value.get("timestamp").is_none());
    }

    #[test]
    fn test_decode_distinguishes_variants() {
        let decoded = WireSnapshot::from_json(&btc_snapshot().to_json().unwrap()).unwrap();
        match decoded {
            WireSnapshot::Prices { prices, .. } => {
                assert_eq!(prices["bitcoin"].price, dec!(50000));
                assert_eq!(prices["bitcoin"].change_24h, dec!(-2.5));
            }
            WireSnapshot::Error { .. } => panic!("expected prices"),
        }

        let decoded = WireSnapshot::from_json(r#"{"error":"boom"}"#).unwrap();
        assert_eq!(
            decoded,
            WireSnapshot::Error {
                error: "boom".to_string()
            }
        );
    }
}
