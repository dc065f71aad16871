//! Configuration file tests

use price_relay::config::Config;
use price_relay::telemetry::LogFormat;
use std::path::Path;
use tokio_test::assert_ok;

#[test]
fn test_config_example_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml.example");
    let config = assert_ok!(Config::load(path));

    let symbols: Vec<_> = config.source.instruments().into_iter().map(|i| i.symbol).collect();
    assert_eq!(symbols, vec!["BTC", "ETH", "SOL"]);
    assert_eq!(config.scheduler.update_interval_secs, 60);
    assert_eq!(config.scheduler.retry_pause_secs, 30);
    assert_eq!(config.scheduler.max_retries, 3);
    assert_eq!(config.server.ws_path, "/ws/crypto-prices");
    assert!(config.notify.telegram_bot_token.is_none());
    assert_eq!(config.telemetry.metrics_port, 0);
    assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
}

#[test]
fn test_env_credentials_enable_telegram() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml.example");
    let config = assert_ok!(Config::load(path)).with_overrides_from(|key| match key {
        "TELEGRAM_BOT_TOKEN" => Some("123:abc".to_string()),
        "TELEGRAM_CHAT_ID" => Some("42".to_string()),
        _ => None,
    });

    let sink = assert_ok!(price_relay::notify::sink_from_config(&config.notify));
    assert!(sink.is_enabled());
}
