//! Fetch command implementation

use crate::config::Config;
use crate::source::{CoinGeckoSource, PriceSource, WireSnapshot};
use clap::Args;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Pretty-print the JSON output
    #[arg(short, long)]
    pub pretty: bool,
}

impl FetchArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let source = CoinGeckoSource::with_config(config.source.client_config(), config.source.instruments());
        let snapshot = source.fetch().await;
        source.close().await;

        let wire = WireSnapshot::from(&snapshot);
        let json = if self.pretty {
            serde_json::to_string_pretty(&wire)?
        } else {
            serde_json::to_string(&wire)?
        };
        println!("{}", json);

        match snapshot.error() {
            Some(err) => anyhow::bail!("Fetch failed: {}", err),
            None => Ok(()),
        }
    }
}
