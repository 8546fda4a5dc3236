//! # Bot Module
//!
//! Capa de despacho de Ritmo: el event handler de serenity que traduce
//! comandos slash y botones en operaciones sobre la cola de cada guild.
//!
//! El bot posee el [`QueueRegistry`] y lo inyecta en los handlers; las
//! conexiones de voz las administra songbird y cada cola guarda el handle
//! de la suya para las operaciones de audio.

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{audio::registry::QueueRegistry, config::Config, sources::YouTubeClient};

/// Event handler principal del bot.
pub struct RitmoBot {
    /// Configuración cargada del entorno
    config: Arc<Config>,
    /// Colas de reproducción por guild, creadas perezosamente
    pub queues: Arc<QueueRegistry>,
    /// Resolución de metadata contra YouTube
    pub youtube: YouTubeClient,
}

impl RitmoBot {
    pub fn new(config: Config) -> Self {
        let queues = Arc::new(QueueRegistry::new(
            config.default_volume,
            config.max_queue_size,
        ));

        Self {
            config: Arc::new(config),
            queues,
            youtube: YouTubeClient::new(),
        }
    }

    /// Registra los comandos slash: por guild si hay `GUILD_ID` (propaga
    /// en segundos, útil en desarrollo), globales si no.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos registrados para guild {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Conecta el bot a un canal de voz y devuelve el handle de la
    /// conexión para construir la cola encima.
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<Mutex<songbird::Call>>> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let call = manager.join(guild_id, channel_id).await?;

        info!("🔊 Conectado al canal de voz en guild {}", guild_id);
        Ok(call)
    }

    /// Sale del canal de voz de una guild.
    pub async fn leave_voice_channel(&self, ctx: &Context, guild_id: GuildId) -> Result<()> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        manager.remove(guild_id).await?;

        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }
}

#[async_trait]
impl EventHandler for RitmoBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) = handlers::handle_component(&ctx, component_interaction, self).await
                {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Si el bot fue sacado del canal de voz (expulsado o desconectado a
    /// mano), su cola se destruye: equivale a un stop implícito.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                info!("🔌 Bot desconectado del canal de voz en guild {}", guild_id);

                self.queues.remove(guild_id).await;

                if let Some(manager) = songbird::get(&ctx).await {
                    if let Err(e) = manager.remove(guild_id).await {
                        warn!("No se pudo limpiar la sesión de voz: {:?}", e);
                    }
                }
            }
        }
    }
}
