mod config;
mod llm;
mod platform;
mod relay;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::llm::LlmClient;
use crate::relay::Relay;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chatrelay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Model: {}", config.llm.model);
    info!("  Ingress mode: {}", config.ingress.mode);

    // Wire the relay to its completion client
    let llm = Arc::new(LlmClient::new(config.llm.clone())?);
    let relay = Arc::new(Relay::new(llm, config.llm.model.clone()));

    // Run the Telegram ingress
    info!("Relay is starting...");
    platform::telegram::run(relay, &config).await?;

    Ok(())
}
