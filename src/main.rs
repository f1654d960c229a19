mod bot;
mod commands;
mod config;
mod error;
mod events;
mod irc;
mod scheduler;

use std::path::PathBuf;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::error::BotError;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pyramidbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path).map_err(|e| {
        error!("{}", e);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Server: {}", config.irc.address());
    info!("  Channel: #{}", config.irc.channel);
    info!("  Bot: {}", config.irc.bot_name);
    info!("  Events: {:?}", config.events.valid);

    if let Err(e) = bot::run(config).await {
        match e.downcast_ref::<BotError>() {
            Some(err) if err.is_fatal() => error!("Fatal: {}", err),
            _ => error!("Bot stopped: {:#}", e),
        }
        return Err(e);
    }

    info!("Bot stopped");
    Ok(())
}
