//! outline-admin — Telegram-бот для управления ключами серверов Outline VPN.

mod bot;
mod config;
mod link;
mod outline;
mod tls;
mod units;

use std::path::PathBuf;
use std::sync::Arc;
use teloxide::dispatching::Dispatcher;
use teloxide::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("APP_CONFIG_PATH").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH));
    tracing::info!(
        "Starting outline-admin with config {}",
        config_path.display()
    );

    let config = Arc::new(config::Config::load(&config_path)?);
    let token = config.bot_token()?;
    tracing::info!(
        admin_count = config.admin_ids.len(),
        server_count = config.servers.len(),
        servers = ?config.server_names().collect::<Vec<_>>(),
        "Configuration loaded"
    );

    let bot = Bot::new(token);
    let state = bot::handlers::BotState { config };
    tracing::info!("Dispatcher initialized, bot is ready");

    Dispatcher::builder(bot, bot::handlers::schema())
        .dependencies(dptree::deps![state])
        .default_handler(|update| async move {
            tracing::debug!(update_id = ?update.id, "Ignored update");
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
