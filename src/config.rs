use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuración del bot, cargada de variables de entorno (y `.env`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: u8,
    pub max_queue_size: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN")
                .context("DISCORD_TOKEN no está definido")?,
            application_id: std::env::var("APPLICATION_ID")
                .context("APPLICATION_ID no está definido")?
                .parse()
                .context("APPLICATION_ID inválido")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "50".to_string())
                .parse::<u8>()
                .context("DEFAULT_VOLUME inválido")?
                .min(100),
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .context("MAX_QUEUE_SIZE inválido")?,
        };

        Ok(config)
    }
}
