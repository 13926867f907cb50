//! Forecast Bot - size forecasts for Telegram channels
//!
//! 1. Receives operator commands through the Telegram webhook
//! 2. Polls the result feed for each running session
//! 3. Publishes predictions and outcomes to the operator's channel

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use forecast_bot::server::{self, WEBHOOK_PATH};
use forecast_bot::{Config, ForecastRunner, HttpResultFeed, TelegramClient};

/// Forecast bot entry point
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    if dotenvy::dotenv().is_err() {
        info!("No .env file, using process environment");
    }

    info!("Starting Forecast Bot...");

    let config = Config::from_env()?;
    info!(
        "Operators: {}, feed: {}, poll period: {:?}",
        config.operators.len(),
        config.feed_base_url,
        config.poll_period
    );

    let telegram = Arc::new(TelegramClient::new(
        &config.telegram_api_url,
        &config.bot_token,
    )?);
    let feed = Arc::new(HttpResultFeed::new(&config.feed_base_url)?);

    match &config.webhook_url {
        Some(url) => {
            let hook = format!("{}{}", url, WEBHOOK_PATH);
            if let Err(e) = telegram.set_webhook(&hook).await {
                error!("Failed to register webhook {}: {}", hook, e);
            }
        }
        None => warn!("WEBHOOK_URL not set, webhook must be registered externally"),
    }

    let port = config.port;
    let runner = ForecastRunner::new(config, feed, telegram);

    let shutdown = CancellationToken::new();
    let maintenance = tokio::spawn(Arc::clone(&runner).run(shutdown.clone()));

    tokio::select! {
        result = server::serve(runner, port) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    shutdown.cancel();
    if let Err(e) = maintenance.await? {
        error!("Runner error: {}", e);
    }

    Ok(())
}
