//! Watch command implementation

use crate::config::ServerConfig;
use crate::notify::{format_usd, round_cents};
use crate::source::WireSnapshot;
use crate::ws::{ClientEvent, SnapshotClient, WsConfig};
use clap::Args;
use rust_decimal::Decimal;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Relay URL; defaults to the configured bind address and path
    #[arg(short, long)]
    pub url: Option<String>,

    /// Stop after this many reconnection attempts (0 = never)
    #[arg(long, default_value_t = 0)]
    pub max_reconnects: u32,
}

impl WatchArgs {
    pub async fn execute(&self, server: &ServerConfig) -> anyhow::Result<()> {
        let url = self.url.clone().unwrap_or_else(|| local_url(server));
        let client = SnapshotClient::new(WsConfig::new(url).max_reconnects(self.max_reconnects));
        let mut events = client.connect();

        while let Some(event) = events.recv().await {
            match event {
                ClientEvent::Connected => println!("Connected to {}", client.url()),
                ClientEvent::Snapshot(snapshot) => print!("{}", render(&snapshot)),
                ClientEvent::Reconnecting { attempt } => println!("Reconnecting (attempt {})", attempt),
                ClientEvent::Disconnected => {
                    println!("Disconnected");
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Client URL for a relay bound per `server`
fn local_url(server: &ServerConfig) -> String {
    let host = server.bind_addr.replacen("0.0.0.0", "127.0.0.1", 1);
    format!("ws://{}{}", host, server.ws_path)
}

fn render(snapshot: &WireSnapshot) -> String {
    match snapshot {
        WireSnapshot::Prices { timestamp, prices } => {
            let mut out = format!("[{}]\n", timestamp.format("%H:%M:%S"));
            for record in prices.values() {
                let sign = if record.change_24h >= Decimal::ZERO { "+" } else { "" };
                out.push_str(&format!(
                    "  {:<6} ${:>14}  {}{:.2}%\n",
                    record.symbol,
                    format_usd(record.price),
                    sign,
                    round_cents(record.change_24h)
                ));
            }
            out
        }
        WireSnapshot::Error { error } => format!("Relay error: {}\n", error),
    }
}
