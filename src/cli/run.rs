//! Run command implementation

use crate::app::AppContext;
use crate::config::Config;
use crate::scheduler::{SchedulerSettings, UpdateScheduler};
use crate::ws::WsServer;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the WebSocket bind address
    #[arg(short, long)]
    pub bind: Option<String>,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut config = config.clone();
        if let Some(bind) = &self.bind {
            config.server.bind_addr = bind.clone();
        }

        let ctx = Arc::new(AppContext::from_config(&config)?);
        let listener = WsServer::bind(&config.server.bind_addr).await?;
        let server = WsServer::new(ctx.clone(), config.server.ws_path.clone());
        let scheduler = UpdateScheduler::new(ctx.clone(), SchedulerSettings::from(&config.scheduler));

        tracing::info!(
            instruments = ctx.source().instruments().len(),
            interval_secs = config.scheduler.update_interval_secs,
            "Price relay started"
        );

        // Dropping the losing branches cancels in-flight fetches and sleeps
        tokio::select! {
            _ = server.serve(listener) => {
                tracing::warn!("WebSocket server stopped");
            }
            _ = scheduler.run() => {
                tracing::warn!("Update scheduler stopped");
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                }
                tracing::info!("Shutdown signal received");
            }
        }

        ctx.shutdown().await;
        Ok(())
    }
}
