//! Full pipeline tests against mocked CoinGecko and Telegram APIs

use async_trait::async_trait;
use price_relay::app::AppContext;
use price_relay::broadcast::{DeliveryError, Subscriber};
use price_relay::config::Config;
use price_relay::scheduler::{SchedulerSettings, SnapshotOrigin, UpdateScheduler};
use price_relay::source::WireSnapshot;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct Collector {
    frames: Mutex<Vec<String>>,
}

#[async_trait]
impl Subscriber for Collector {
    async fn send(&self, payload: &str) -> Result<(), DeliveryError> {
        self.frames.lock().unwrap().push(payload.to_string());
        Ok(())
    }
}

fn relay_config(coingecko: &MockServer, telegram: &MockServer) -> Config {
    let mut config = Config::default();
    config.source.base_url = coingecko.uri();
    config.source.rate_limit_pause_secs = 0;
    config.notify.telegram_api_url = telegram.uri();
    config.notify.telegram_bot_token = Some("123:abc".to_string());
    config.notify.telegram_chat_id = Some("42".to_string());
    config
}

fn fast_settings() -> SchedulerSettings {
    SchedulerSettings {
        update_interval: Duration::from_millis(10),
        retry_pause: Duration::from_millis(10),
        max_retries: 3,
    }
}

#[tokio::test]
async fn test_rate_limited_then_fresh_snapshot_flows_everywhere() {
    let coingecko = MockServer::start().await;
    let telegram = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&coingecko)
        .await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .and(query_param("ids", "bitcoin,ethereum,solana"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bitcoin": {"usd": 50000, "usd_24h_change": 2.5, "last_updated_at": 1704067200},
            "ethereum": {"usd": 2500, "usd_24h_change": -1.0, "last_updated_at": 1704067200},
            "solana": {"usd": 100, "usd_24h_change": 0, "last_updated_at": 1704067200}
        })))
        .mount(&coingecko)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_partial_json(json!({"chat_id": "42", "parse_mode": "Markdown"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&telegram)
        .await;

    let ctx = Arc::new(AppContext::from_config(&relay_config(&coingecko, &telegram)).unwrap());
    let collector = Arc::new(Collector::default());
    ctx.broadcaster().connect(collector.clone()).await.unwrap();

    let mut scheduler = UpdateScheduler::new(ctx.clone(), fast_settings());
    let report = scheduler.run_cycle().await;
    scheduler.wait_for_notifications().await;

    assert_eq!(report.origin, SnapshotOrigin::Fresh);
    assert_eq!(report.attempts, 2);
    assert!(report.notified);
    assert_eq!(report.publish.delivered, 1);

    let frames = collector.frames.lock().unwrap().clone();
    assert_eq!(frames.len(), 1);
    match WireSnapshot::from_json(&frames[0]).unwrap() {
        WireSnapshot::Prices { prices, .. } => {
            assert_eq!(prices["bitcoin"].price, dec!(50000));
            assert_eq!(prices["ethereum"].change_24h, dec!(-1));
            assert_eq!(prices["solana"].symbol, "SOL");
        }
        other => panic!("expected prices, got {:?}", other),
    }

    telegram.verify().await;
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_upstream_outage_serves_cache_and_keeps_notifying() {
    let coingecko = MockServer::start().await;
    let telegram = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bitcoin": {"usd": 48000, "usd_24h_change": -3.0, "last_updated_at": 1704067200}
        })))
        .up_to_n_times(1)
        .mount(&coingecko)
        .await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&coingecko)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(2)
        .mount(&telegram)
        .await;

    let ctx = Arc::new(AppContext::from_config(&relay_config(&coingecko, &telegram)).unwrap());
    let collector = Arc::new(Collector::default());
    ctx.broadcaster().connect(collector.clone()).await.unwrap();

    let mut scheduler = UpdateScheduler::new(ctx.clone(), fast_settings());
    let first = scheduler.run_cycle().await;
    let second = scheduler.run_cycle().await;
    scheduler.wait_for_notifications().await;

    assert_eq!(first.origin, SnapshotOrigin::Fresh);
    assert_eq!(second.origin, SnapshotOrigin::Cached);
    // Non-throttle failures are not retried
    assert_eq!(second.attempts, 1);

    let frames = collector.frames.lock().unwrap().clone();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0], frames[1]);

    telegram.verify().await;
}

#[tokio::test]
async fn test_rejected_notification_does_not_affect_cycle() {
    let coingecko = MockServer::start().await;
    let telegram = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bitcoin": {"usd": 50000, "usd_24h_change": 1.0, "last_updated_at": 1704067200}
        })))
        .mount(&coingecko)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        })))
        .mount(&telegram)
        .await;

    let ctx = Arc::new(AppContext::from_config(&relay_config(&coingecko, &telegram)).unwrap());
    let mut scheduler = UpdateScheduler::new(ctx.clone(), fast_settings());

    let report = scheduler.run_cycle().await;
    scheduler.wait_for_notifications().await;

    assert_eq!(report.origin, SnapshotOrigin::Fresh);
    assert!(report.notified);
    assert!(ctx.cache().get().await.is_some());
}
