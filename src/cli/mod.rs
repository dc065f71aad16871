//! CLI interface for price-relay
//!
//! Provides subcommands for:
//! - `run`: Start the relay (scheduler plus WebSocket server)
//! - `fetch`: Fetch one snapshot and print it
//! - `watch`: Subscribe to a running relay and print updates
//! - `config`: Show the effective configuration

mod fetch;
mod run;
mod watch;

pub use fetch::FetchArgs;
pub use run::RunArgs;
pub use watch::WatchArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "price-relay")]
#[command(about = "Crypto price relay: polls CoinGecko and pushes snapshots to WebSocket subscribers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the relay
    Run(RunArgs),
    /// Fetch one snapshot and print it as JSON
    Fetch(FetchArgs),
    /// Print snapshots pushed by a running relay
    Watch(WatchArgs),
    /// Show configuration
    Config,
}
