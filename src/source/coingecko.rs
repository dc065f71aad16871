//! CoinGecko `simple/price` client
//!
//! One request per fetch covers every instrument. The HTTP client is created
//! on first use and kept until [`PriceSource::close`] is called.

use super::{FetchError, Instrument, PriceRecord, PriceSnapshot, PriceSource};
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// CoinGecko public API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Configuration for the CoinGecko source
#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    /// Base URL for the API (without the `/simple/price` suffix)
    pub base_url: String,
    /// Quote currency
    pub vs_currency: String,
    /// Value of the `User-Agent` header identifying this client
    pub user_agent: String,
    /// Request timeout. `None` leaves the transport default in place.
    pub request_timeout: Option<Duration>,
    /// Pause applied inside `fetch` after a 429, before returning
    pub rate_limit_pause: Duration,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: COINGECKO_API_URL.to_string(),
            vs_currency: "usd".to_string(),
            user_agent: "CryptoPriceTracker/1.0".to_string(),
            request_timeout: None,
            rate_limit_pause: Duration::from_secs(10),
        }
    }
}

/// Price source backed by CoinGecko
pub struct CoinGeckoSource {
    config: CoinGeckoConfig,
    instruments: Vec<Instrument>,
    client: Mutex<Option<Client>>,
}

impl CoinGeckoSource {
    /// Create a source for the given instruments with default configuration
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self::with_config(CoinGeckoConfig::default(), instruments)
    }

    /// Create a source with custom configuration
    pub fn with_config(config: CoinGeckoConfig, instruments: Vec<Instrument>) -> Self {
        Self {
            config,
            instruments,
            client: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CoinGeckoConfig {
        &self.config
    }

    /// Whether the HTTP client has been created and not yet released
    pub async fn is_connected(&self) -> bool {
        self.client.lock().await.is_some()
    }

    fn price_url(&self) -> String {
        format!("{}/simple/price", self.config.base_url.trim_end_matches('/'))
    }

    /// Return the shared client, creating it on first use
    async fn client(&self) -> Result<Client, FetchError> {
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let mut builder = Client::builder();
        if let Some(timeout) = self.config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to create HTTP client: {}", e)))?;

        tracing::debug!("Created CoinGecko HTTP client");
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Perform the request and classify the outcome
    async fn request(&self) -> Result<BTreeMap<String, PriceRecord>, FetchError> {
        let client = self.client().await?;
        let ids = self
            .instruments
            .iter()
            .map(|i| i.id.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let url = self.price_url();
        tracing::debug!(url = %url, ids = %ids, "Fetching prices from CoinGecko");

        let response = client
            .get(&url)
            .query(&[
                ("ids", ids.as_str()),
                ("vs_currencies", self.config.vs_currency.as_str()),
                ("include_24hr_change", "true"),
                ("include_last_updated_at", "true"),
            ])
            .header(USER_AGENT, &self.config.user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Upstream {
                status: status.as_u16(),
            });
        }

        let body: Map<String, Value> = response
            .json()
            .await
            .map_err(|e| FetchError::Transport(format!("failed to decode response: {}", e)))?;

        self.normalize(&body)
    }

    /// Turn the upstream body into one record per instrument
    ///
    /// Instruments or fields missing from the body get zero values. A body
    /// carrying none of the requested instruments is treated as an error.
    fn normalize(&self, body: &Map<String, Value>) -> Result<BTreeMap<String, PriceRecord>, FetchError> {
        if let Some(code) = body
            .get("status")
            .and_then(|s| s.get("error_code"))
            .and_then(Value::as_u64)
        {
            return Err(match code {
                429 => FetchError::RateLimited,
                code => FetchError::Upstream {
                    status: u16::try_from(code).unwrap_or(u16::MAX),
                },
            });
        }

        if !self.instruments.iter().any(|i| body.contains_key(&i.id)) {
            return Err(FetchError::Transport(
                "response contained none of the requested instruments".to_string(),
            ));
        }

        let currency = self.config.vs_currency.as_str();
        let change_key = format!("{}_24h_change", currency);

        let records = self
            .instruments
            .iter()
            .map(|inst| {
                let fields = body.get(&inst.id).and_then(Value::as_object);
                let field = |key: &str| fields.and_then(|f| f.get(key));

                let record = PriceRecord {
                    name: inst.name.clone(),
                    symbol: inst.symbol.clone(),
                    price: field(currency)
                        .map(decimal_from_json)
                        .unwrap_or_default()
                        .max(Decimal::ZERO),
                    change_24h: field(&change_key).map(decimal_from_json).unwrap_or_default(),
                    last_updated: field("last_updated_at")
                        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
                        .unwrap_or_default(),
                };
                (inst.id.clone(), record)
            })
            .collect();

        Ok(records)
    }
}

/// Parse a JSON number into a Decimal, keeping the textual precision
fn decimal_from_json(value: &Value) -> Decimal {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .unwrap_or_default()
        }
        _ => Decimal::ZERO,
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    async fn fetch(&self) -> PriceSnapshot {
        let started = Instant::now();
        let result = self.request().await;
        telemetry::record_latency(LatencyMetric::UpstreamFetch, started.elapsed());

        match result {
            Ok(records) => {
                telemetry::increment(CounterMetric::FetchSuccess);
                tracing::debug!(instruments = records.len(), "Fetched prices");
                PriceSnapshot::prices(records)
            }
            Err(FetchError::RateLimited) => {
                telemetry::increment(CounterMetric::FetchRateLimited);
                tracing::warn!(
                    pause_secs = self.config.rate_limit_pause.as_secs(),
                    "Rate limited by CoinGecko API"
                );
                tokio::time::sleep(self.config.rate_limit_pause).await;
                PriceSnapshot::failed(FetchError::RateLimited)
            }
            Err(e) => {
                telemetry::increment(match e {
                    FetchError::Upstream { .. } => CounterMetric::FetchUpstreamError,
                    _ => CounterMetric::FetchTransportError,
                });
                tracing::error!(error = %e, kind = e.kind(), "CoinGecko fetch failed");
                PriceSnapshot::failed(e)
            }
        }
    }

    fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    fn throttle_pause(&self) -> Duration {
        self.config.rate_limit_pause
    }

    async fn close(&self) {
        if self.client.lock().await.take().is_some() {
            tracing::info!("Released CoinGecko HTTP client");
        }
    }
}
