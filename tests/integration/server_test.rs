//! WebSocket server end-to-end tests

use crate::support::{btc, ScriptedSource};
use futures_util::{SinkExt, StreamExt};
use price_relay::app::AppContext;
use price_relay::notify::DisabledSink;
use price_relay::scheduler::{SchedulerSettings, UpdateScheduler};
use price_relay::source::{PriceRecord, PriceSnapshot, WireSnapshot};
use price_relay::ws::{ClientEvent, SnapshotClient, WsConfig, WsServer};
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

const PATH: &str = "/ws/crypto-prices";

async fn start_relay(script: Vec<PriceSnapshot>) -> (Arc<AppContext>, UpdateScheduler, SocketAddr) {
    let ctx = AppContext::new(Arc::new(ScriptedSource::new(script)), Arc::new(DisabledSink));
    serve(ctx).await
}

async fn serve(ctx: AppContext) -> (Arc<AppContext>, UpdateScheduler, SocketAddr) {
    let ctx = Arc::new(ctx);
    let listener = WsServer::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(WsServer::new(ctx.clone(), PATH).serve(listener));

    let scheduler = UpdateScheduler::new(ctx.clone(), SchedulerSettings::default());
    (ctx, scheduler, addr)
}

fn price_of(text: &str) -> rust_decimal::Decimal {
    match WireSnapshot::from_json(text).unwrap() {
        WireSnapshot::Prices { prices, .. } => prices["bitcoin"].price,
        other => panic!("expected prices, got {:?}", other),
    }
}

async fn next_text<S>(read: &mut S) -> String
where
    S: futures_util::Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let msg = timeout(Duration::from_secs(5), read.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return text;
        }
    }
}

#[tokio::test]
async fn test_initial_push_then_broadcast() {
    let (ctx, mut scheduler, addr) = start_relay(vec![btc(dec!(50000)), btc(dec!(51000))]).await;
    scheduler.run_cycle().await;

    let (ws, _) = connect_async(format!("ws://{}{}", addr, PATH)).await.unwrap();
    let (_write, mut read) = ws.split();

    assert_eq!(price_of(&next_text(&mut read).await), dec!(50000));
    assert_eq!(ctx.broadcaster().registry().len().await, 1);

    let report = scheduler.run_cycle().await;
    assert_eq!(report.publish.delivered, 1);
    assert_eq!(price_of(&next_text(&mut read).await), dec!(51000));
}

#[tokio::test]
async fn test_no_initial_push_on_cold_cache() {
    let (ctx, mut scheduler, addr) = start_relay(vec![btc(dec!(50000))]).await;

    let (ws, _) = connect_async(format!("ws://{}{}", addr, PATH)).await.unwrap();
    let (_write, mut read) = ws.split();

    // Registration happens after the handshake completes
    timeout(Duration::from_secs(5), async {
        while ctx.broadcaster().registry().is_empty().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    scheduler.run_cycle().await;
    assert_eq!(price_of(&next_text(&mut read).await), dec!(50000));
}

#[tokio::test]
async fn test_failed_cycle_pushes_error_object() {
    let (_ctx, mut scheduler, addr) = start_relay(vec![]).await;

    let (ws, _) = connect_async(format!("ws://{}{}", addr, PATH)).await.unwrap();
    let (_write, mut read) = ws.split();

    // Poll until registered, then publish the cold-start failure
    let mut text = None;
    for _ in 0..50 {
        let report = scheduler.run_cycle().await;
        if report.publish.delivered == 1 {
            text = Some(next_text(&mut read).await);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let text = text.expect("subscriber never registered");
    assert!(matches!(WireSnapshot::from_json(&text).unwrap(), WireSnapshot::Error { .. }));
}

#[tokio::test]
async fn test_unknown_path_rejected() {
    let (_ctx, _scheduler, addr) = start_relay(vec![]).await;

    let err = connect_async(format!("ws://{}/ws/other", addr)).await.unwrap_err();
    match err {
        tungstenite::Error::Http(response) => assert_eq!(response.status(), 404),
        other => panic!("expected HTTP rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_client_close_unregisters() {
    let (ctx, mut scheduler, addr) = start_relay(vec![btc(dec!(50000))]).await;
    scheduler.run_cycle().await;

    let (ws, _) = connect_async(format!("ws://{}{}", addr, PATH)).await.unwrap();
    let (mut write, mut read) = ws.split();
    next_text(&mut read).await;
    assert_eq!(ctx.broadcaster().registry().len().await, 1);

    write.send(Message::Close(None)).await.unwrap();

    timeout(Duration::from_secs(5), async {
        while !ctx.broadcaster().registry().is_empty().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber was not removed");
}

#[tokio::test]
async fn test_snapshot_client_receives_updates() {
    let (_ctx, mut scheduler, addr) = start_relay(vec![btc(dec!(50000)), btc(dec!(52000))]).await;
    scheduler.run_cycle().await;

    let client = SnapshotClient::new(WsConfig::new(format!("ws://{}{}", addr, PATH)).max_reconnects(1));
    let mut events = client.connect();

    assert_eq!(events.recv().await, Some(ClientEvent::Connected));
    match timeout(Duration::from_secs(5), events.recv()).await.unwrap() {
        Some(ClientEvent::Snapshot(WireSnapshot::Prices { prices, .. })) => {
            assert_eq!(prices["bitcoin"].price, dec!(50000));
        }
        other => panic!("expected snapshot, got {:?}", other),
    }

    scheduler.run_cycle().await;
    match timeout(Duration::from_secs(5), events.recv()).await.unwrap() {
        Some(ClientEvent::Snapshot(WireSnapshot::Prices { prices, .. })) => {
            assert_eq!(prices["bitcoin"].price, dec!(52000));
        }
        other => panic!("expected snapshot, got {:?}", other),
    }
}

/// Snapshot whose encoding is a few megabytes
fn bulky_snapshot() -> PriceSnapshot {
    let records = (0..20_000)
        .map(|i| {
            let record = PriceRecord {
                name: format!("Coin number {}", i),
                symbol: format!("COIN{}", i),
                price: dec!(12345.6789),
                change_24h: dec!(-1.25),
                last_updated: 1704067200,
            };
            (format!("coin-{}", i), record)
        })
        .collect::<BTreeMap<_, _>>();
    PriceSnapshot::prices(records)
}

#[tokio::test]
async fn test_unresponsive_subscriber_is_disconnected() {
    let ctx = AppContext::with_send_timeout(
        Arc::new(ScriptedSource::new(vec![])),
        Arc::new(DisabledSink),
        Duration::from_millis(200),
    );
    let (ctx, _scheduler, addr) = serve(ctx).await;

    let (ws, _) = connect_async(format!("ws://{}{}", addr, PATH)).await.unwrap();
    let (_write, mut read) = ws.split();

    timeout(Duration::from_secs(5), async {
        while ctx.broadcaster().registry().is_empty().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // The client never reads, so socket buffers fill until a send times out
    let bulky = bulky_snapshot();
    let mut dropped = false;
    for _ in 0..100 {
        let report = ctx.broadcaster().publish(&bulky).await;
        if !report.failed.is_empty() {
            dropped = true;
            break;
        }
    }
    assert!(dropped, "subscriber was never dropped");
    assert!(ctx.broadcaster().registry().is_empty().await);

    // Buffered frames drain, then the connection ends
    let ended = timeout(Duration::from_secs(20), async {
        loop {
            match read.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "connection stayed open after the subscriber was dropped");
}
