//! Snapshot subscriber client with automatic reconnection

use super::types::{ClientEvent, WsConfig, WsError};
use crate::source::WireSnapshot;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Subscribes to a price relay and decodes every pushed snapshot
pub struct SnapshotClient {
    config: WsConfig,
}

impl SnapshotClient {
    /// Create a new client with the given configuration
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    /// Create a new client with just a URL using default config
    pub fn with_url(url: impl Into<String>) -> Self {
        Self::new(WsConfig::new(url))
    }

    /// Get the configured URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Connect and return a receiver for client events
    ///
    /// A background task owns the connection and reconnects with exponential
    /// backoff. Dropping the receiver stops it.
    pub fn connect(&self) -> mpsc::Receiver<ClientEvent> {
        let (tx, rx) = mpsc::channel(256);
        let config = self.config.clone();

        tokio::spawn(async move {
            if let Err(e) = Self::run_connection_loop(config, tx).await {
                tracing::error!(error = %e, "Snapshot client loop failed");
            }
        });

        rx
    }

    async fn run_connection_loop(
        config: WsConfig,
        tx: mpsc::Sender<ClientEvent>,
    ) -> Result<(), WsError> {
        let mut reconnect_attempts = 0;
        let mut reconnect_delay = config.initial_reconnect_delay;

        loop {
            let mut connected = false;
            let result = Self::connect_and_stream(&config, &tx, &mut connected).await;

            // Only consecutive failed connects count towards the limit
            if connected {
                reconnect_attempts = 0;
                reconnect_delay = config.initial_reconnect_delay;
            }

            match result {
                Ok(()) => {
                    tracing::info!("Relay connection closed cleanly");
                    let _ = tx.send(ClientEvent::Disconnected).await;
                    break;
                }
                Err(e) => {
                    reconnect_attempts += 1;
                    tracing::warn!(
                        error = %e,
                        attempt = reconnect_attempts,
                        "Relay connection error, reconnecting..."
                    );

                    if config.max_reconnect_attempts > 0
                        && reconnect_attempts >= config.max_reconnect_attempts
                    {
                        tracing::error!("Max reconnection attempts reached");
                        let _ = tx.send(ClientEvent::Disconnected).await;
                        return Err(WsError::MaxReconnectsExceeded);
                    }

                    if tx.is_closed() {
                        tracing::info!("Receiver dropped, stopping reconnection");
                        break;
                    }

                    let _ = tx
                        .send(ClientEvent::Reconnecting {
                            attempt: reconnect_attempts,
                        })
                        .await;

                    sleep(reconnect_delay).await;
                    reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay);
                }
            }
        }

        Ok(())
    }

    /// Stream one connection; `connected` is set once the handshake succeeded
    async fn connect_and_stream(
        config: &WsConfig,
        tx: &mpsc::Sender<ClientEvent>,
        connected: &mut bool,
    ) -> Result<(), WsError> {
        tracing::info!(url = %config.url, "Connecting to relay");

        let (ws_stream, _response) = connect_async(&config.url)
            .await
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        *connected = true;
        if tx.send(ClientEvent::Connected).await.is_err() {
            return Ok(());
        }

        let mut ping_interval = tokio::time::interval(config.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick completes immediately
        ping_interval.tick().await;

        let mut waiting_for_pong = false;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match WireSnapshot::from_json(&text) {
                                Ok(snapshot) => {
                                    if tx.send(ClientEvent::Snapshot(snapshot)).await.is_err() {
                                        tracing::debug!("Receiver dropped, closing connection");
                                        return Ok(());
                                    }
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "Skipping undecodable message");
                                }
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            waiting_for_pong = false;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Received close frame");
                            return Ok(());
                        }
                        Some(Err(e)) => {
                            return Err(WsError::ConnectionFailed(e.to_string()));
                        }
                        None => {
                            return Err(WsError::ConnectionFailed("Stream ended unexpectedly".into()));
                        }
                        _ => {}
                    }
                }

                _ = ping_interval.tick() => {
                    if waiting_for_pong {
                        return Err(WsError::ConnectionFailed("Pong timeout".into()));
                    }
                    write.send(Message::Ping(vec![])).await
                        .map_err(|e| WsError::SendFailed(e.to_string()))?;
                    waiting_for_pong = true;
                }
            }
        }
    }
}
