use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod sources;
mod ui;

use crate::bot::RitmoBot;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ritmo=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Ritmo v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;

    // Intents mínimos: guilds, estados de voz y mensajes
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES;

    let handler = RitmoBot::new(config.clone());

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    info!("🚀 Conectando a Discord...");
    if let Err(e) = client.start().await {
        error!("Error del cliente: {:?}", e);
    }

    Ok(())
}
