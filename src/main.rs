use serenity::Client;
use serenity::all::GatewayIntents;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod clock;
mod commands;
mod config;
mod export;
mod format;
mod handler;
mod history;
mod notify;
mod tracker;

use crate::clock::SystemClock;
use crate::config::Config;
use crate::handler::{ConfigKey, TrackerKey, VoiceHandler};
use crate::tracker::VoiceTracker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::from_env()?);
    let tracker = Arc::new(VoiceTracker::new(Arc::new(SystemClock)));

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let mut client = Client::builder(&config.token, intents)
        .event_handler(VoiceHandler)
        .type_map_insert::<TrackerKey>(Arc::clone(&tracker))
        .type_map_insert::<ConfigKey>(Arc::clone(&config))
        .await?;

    // ctrl-c drains the pending cooldown releases before the gateway drops
    let shard_manager = client.shard_manager.clone();
    let shutdown_tracker = Arc::clone(&tracker);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("apagando el bot");
            shutdown_tracker.shutdown().await;
            shard_manager.shutdown_all().await;
        }
    });

    tracing::info!("iniciando el bot");
    client.start().await?;
    Ok(())
}
