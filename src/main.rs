use clap::Parser;
use price_relay::cli::{Cli, Commands};
use price_relay::config::Config;

const DEFAULT_CONFIG: &str = include_str!("../config.toml.example");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(DEFAULT_CONFIG)?
        }
    }
    .with_env_overrides();

    // Held for the process lifetime
    let _telemetry = price_relay::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting price relay");
            args.execute(&config).await?;
        }
        Commands::Fetch(args) => {
            args.execute(&config).await?;
        }
        Commands::Watch(args) => {
            args.execute(&config.server).await?;
        }
        Commands::Config => {
            let symbols: Vec<_> = config
                .source
                .instruments()
                .into_iter()
                .map(|i| i.symbol)
                .collect();
            println!("Current configuration:");
            println!("  Source: {} ({})", config.source.base_url, symbols.join(", "));
            println!(
                "  Scheduler: every {}s, retry pause {}s, max retries {}",
                config.scheduler.update_interval_secs,
                config.scheduler.retry_pause_secs,
                config.scheduler.max_retries
            );
            println!("  Server: ws://{}{}", config.server.bind_addr, config.server.ws_path);
            let telegram = config.notify.telegram_bot_token.is_some() && config.notify.telegram_chat_id.is_some();
            println!("  Telegram: {}", if telegram { "enabled" } else { "disabled" });
            match config.telemetry.metrics_port {
                0 => println!("  Metrics: disabled"),
                port => println!("  Metrics: :{}", port),
            }
        }
    }

    Ok(())
}
