//! WebSocket server that registers every accepted connection as a subscriber

use super::types::WsError;
use crate::app::AppContext;
use crate::broadcast::{DeliveryError, Subscriber, SubscriberId};
use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Upper bound on delivering the close frame to a dropped subscriber
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Write half of an accepted connection
pub struct WsSubscriber {
    peer: SocketAddr,
    sink: Mutex<WsSink>,
    shutdown: Notify,
}

impl WsSubscriber {
    fn new(peer: SocketAddr, sink: WsSink) -> Self {
        Self {
            peer,
            sink: Mutex::new(sink),
            shutdown: Notify::new(),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Resolves once the broadcaster has dropped this subscriber
    async fn dropped(&self) {
        self.shutdown.notified().await;
    }

    /// Best-effort close frame; a peer that stopped reading gets none
    async fn send_close(&self) {
        let frame = CloseFrame {
            code: CloseCode::Again,
            reason: "subscriber dropped".into(),
        };
        let close = async {
            let mut sink = self.sink.lock().await;
            sink.send(Message::Close(Some(frame))).await
        };
        match timeout(CLOSE_TIMEOUT, close).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(peer = %self.peer, error = %e, "Close frame not sent"),
            Err(_) => tracing::debug!(peer = %self.peer, "Close frame timed out"),
        }
    }
}

#[async_trait]
impl Subscriber for WsSubscriber {
    async fn send(&self, payload: &str) -> Result<(), DeliveryError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(payload.to_owned()))
            .await
            .map_err(delivery_error)
    }

    fn close(&self) {
        // Stores a permit if the read loop is not waiting yet
        self.shutdown.notify_one();
    }
}

fn delivery_error(err: tungstenite::Error) -> DeliveryError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            DeliveryError::Closed
        }
        other => DeliveryError::Write(other.to_string()),
    }
}

/// Accepts WebSocket connections on a single path
pub struct WsServer {
    ctx: Arc<AppContext>,
    path: String,
}

impl WsServer {
    pub fn new(ctx: Arc<AppContext>, path: impl Into<String>) -> Self {
        Self {
            ctx,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Bind a listener for [`WsServer::serve`]
    pub async fn bind(addr: &str) -> Result<TcpListener, WsError> {
        TcpListener::bind(addr)
            .await
            .map_err(|e| WsError::Bind(format!("{}: {}", addr, e)))
    }

    /// Accept connections until the future is dropped
    pub async fn serve(self, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(addr = %addr, path = %self.path, "WebSocket server listening");
        }

        let path: Arc<str> = Arc::from(self.path.as_str());
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            let ctx = self.ctx.clone();
            let path = path.clone();
            tokio::spawn(async move {
                handle_connection(ctx, stream, peer, path).await;
            });
        }
    }
}

async fn handle_connection(ctx: Arc<AppContext>, stream: TcpStream, peer: SocketAddr, path: Arc<str>) {
    let check_path = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if request.uri().path() == &*path {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("Not Found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };

    let ws_stream = match accept_hdr_async(stream, check_path).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!(peer = %peer, error = %e, "WebSocket handshake rejected");
            return;
        }
    };

    let (write, mut read) = ws_stream.split();
    let subscriber = Arc::new(WsSubscriber::new(peer, write));

    let id = match ctx.broadcaster().connect(subscriber.clone()).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(peer = %peer, error = %e, "Initial push failed, dropping connection");
            return;
        }
    };
    tracing::debug!(peer = %peer, subscriber = %id, "WebSocket session started");

    // Inbound frames only signal liveness
    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!(subscriber = %id, len = text.len(), "Ignoring inbound message");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(subscriber = %id, error = %e, "Connection error");
                    break;
                }
            },
            _ = subscriber.dropped() => {
                tracing::debug!(subscriber = %id, "Dropped by broadcaster, closing connection");
                subscriber.send_close().await;
                break;
            }
        }
    }

    close_subscriber(&ctx, id, peer).await;
}

async fn close_subscriber(ctx: &AppContext, id: SubscriberId, peer: SocketAddr) {
    ctx.broadcaster().disconnect(id).await;
    tracing::debug!(peer = %peer, subscriber = %id, "WebSocket session ended");
}
