mod config;
mod error;
mod message;
mod reconnect;
mod responder;
mod session;
mod transport;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::reconnect::ReconnectLoop;
use crate::responder::rules;
use crate::transport::tcp::TcpConnector;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hollybot=debug".into()),
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
    info!("  Chat bus: {}", config.bus.address());
    info!("  Mention names: {:?}", config.parser.mention_names);
    info!("  Reconnect backoff: {}s", config.reconnect.backoff_secs);
    info!("  Rules: {}", config.rules.len());

    let responder = rules::build(&config.rules);
    if responder.is_empty() {
        info!("No rules configured, messages will be logged but never answered");
    }

    let reconnect = ReconnectLoop::new(
        Box::new(TcpConnector::from_config(&config.bus)),
        config.parser.to_parser_config(),
        Box::new(responder),
        config.reconnect.backoff(),
    )
    .with_reply_sender(config.bus.reply_sender.clone());

    info!("Client is starting...");
    tokio::select! {
        _ = reconnect.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received, closing connection");
        }
    }

    Ok(())
}
