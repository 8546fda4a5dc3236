use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::queue::Track,
    bot::RitmoBot,
    ui::{buttons, buttons::button_ids, embeds},
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RitmoBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, bot, guild_id).await?,
        "pause" => handle_pause(ctx, command, bot, guild_id).await?,
        "resume" => handle_resume(ctx, command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, command, bot, guild_id).await?,
        "stop" => handle_stop(ctx, command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, command, bot, guild_id).await?,
        "nowplaying" => handle_nowplaying(ctx, command, bot, guild_id).await?,
        "volume" => handle_volume(ctx, command, bot, guild_id).await?,
        "loop" => handle_loop(ctx, command, bot, guild_id).await?,
        "shuffle" => handle_shuffle(ctx, command, bot, guild_id).await?,
        "remove" => handle_remove(ctx, command, bot, guild_id).await?,
        "clear" => handle_clear(ctx, command, bot, guild_id).await?,
        _ => {
            respond_error(ctx, &command, "Comando no reconocido").await?;
        }
    }

    Ok(())
}

/// Maneja interacciones con los botones de control
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &RitmoBot,
) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Componente usado fuera de un servidor"))?;

    info!(
        "🔘 Botón {} presionado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    let queue = match bot.queues.get(guild_id) {
        Some(queue) => queue,
        None => {
            return component_reply(ctx, &component, "❌ No hay música en reproducción").await;
        }
    };

    match component.data.custom_id.as_str() {
        button_ids::PLAY_PAUSE => {
            let mut queue = queue.lock().await;
            if queue.is_playing().await {
                queue.pause().await;
                drop(queue);
                component_reply(ctx, &component, "⏸️ Pausado").await?;
            } else if queue.is_paused().await {
                queue.resume().await;
                drop(queue);
                component_reply(ctx, &component, "▶️ Reanudado").await?;
            } else {
                drop(queue);
                component_reply(ctx, &component, "❌ Nada en reproducción").await?;
            }
        }
        button_ids::SKIP => {
            queue.lock().await.skip().await;
            component_reply(ctx, &component, "⏭️ Canción saltada").await?;
        }
        button_ids::STOP => {
            bot.queues.remove(guild_id).await;
            if let Err(e) = bot.leave_voice_channel(ctx, guild_id).await {
                warn!("No se pudo salir del canal de voz: {:?}", e);
            }
            component_reply(ctx, &component, "⏹️ Reproducción detenida").await?;
        }
        button_ids::QUEUE => {
            let queue = queue.lock().await;
            let embed = embeds::create_queue_embed(
                queue.current_track(),
                queue.upcoming(10),
                queue.len(),
            );
            drop(queue);

            component
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(embed)
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
        _ => {
            component_reply(ctx, &component, "❌ Acción no reconocida").await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // Defer la respuesta: resolver metadata puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    // El usuario debe estar en un canal de voz
    let voice_channel_id = match get_user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel_id) => channel_id,
        Err(_) => {
            return edit_with_error(ctx, &command, "Debes estar en un canal de voz").await;
        }
    };

    // La metadata se resuelve ANTES de encolar
    let metadata = match bot.youtube.resolve(&query).await {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!("No se pudo resolver '{}': {}", query, e);
            return edit_with_error(ctx, &command, "No se pudo encontrar esa canción").await;
        }
    };

    let track = Track::new(
        metadata.title,
        metadata.url,
        metadata.duration,
        metadata.thumbnail,
        command.user.id,
    );

    // Cola perezosa: se crea junto con la conexión de voz
    let queue = match bot.queues.get(guild_id) {
        Some(queue) => queue,
        None => {
            let call = match bot.join_voice_channel(ctx, guild_id, voice_channel_id).await {
                Ok(call) => call,
                Err(e) => {
                    warn!("No se pudo conectar al canal de voz: {:?}", e);
                    return edit_with_error(ctx, &command, "No se pudo conectar al canal de voz")
                        .await;
                }
            };
            bot.queues.clone().create(guild_id, call)
        }
    };

    let mut queue = queue.lock().await;
    if let Err(e) = queue.add_track(track.clone()) {
        drop(queue);
        return edit_with_error(ctx, &command, &e.to_string()).await;
    }
    let position = queue.len();

    let idle = !queue.is_playing().await && !queue.is_paused().await;
    if idle {
        if queue.play().await {
            drop(queue);
            command
                .edit_response(
                    &ctx.http,
                    EditInteractionResponse::new()
                        .embed(embeds::create_now_playing_embed(&track))
                        .components(buttons::create_player_controls()),
                )
                .await?;
        } else {
            drop(queue);
            edit_with_error(ctx, &command, "No se pudo reproducir esa canción").await?;
        }
    } else {
        drop(queue);
        command
            .edit_response(
                &ctx.http,
                EditInteractionResponse::new()
                    .embed(embeds::create_track_added_embed(&track, position)),
            )
            .await?;
    }

    Ok(())
}

async fn handle_pause(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let queue = match bot.queues.get(guild_id) {
        Some(queue) => queue,
        None => return respond_error(ctx, &command, "Nada en reproducción").await,
    };

    let mut queue = queue.lock().await;
    if !queue.is_playing().await {
        drop(queue);
        return respond_error(ctx, &command, "Nada en reproducción").await;
    }
    queue.pause().await;
    drop(queue);

    respond_embed(
        ctx,
        &command,
        embeds::create_status_embed("⏸️ Música Pausada", "La reproducción se ha pausado."),
    )
    .await
}

async fn handle_resume(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let queue = match bot.queues.get(guild_id) {
        Some(queue) => queue,
        None => return respond_error(ctx, &command, "Nada está pausado").await,
    };

    let mut queue = queue.lock().await;
    if !queue.is_paused().await {
        drop(queue);
        return respond_error(ctx, &command, "Nada está pausado").await;
    }
    queue.resume().await;
    drop(queue);

    respond_embed(
        ctx,
        &command,
        embeds::create_status_embed("▶️ Música Reanudada", "La reproducción continúa."),
    )
    .await
}

async fn handle_skip(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let queue = match bot.queues.get(guild_id) {
        Some(queue) => queue,
        None => return respond_error(ctx, &command, "Nada en reproducción").await,
    };

    let mut queue = queue.lock().await;
    let skipped = match queue.current_track() {
        Some(track) => track.title.clone(),
        None => {
            drop(queue);
            return respond_error(ctx, &command, "Nada en reproducción").await;
        }
    };
    queue.skip().await;
    drop(queue);

    respond_embed(
        ctx,
        &command,
        embeds::create_status_embed("⏭️ Canción Saltada", &format!("Saltada: **{}**", skipped)),
    )
    .await
}

async fn handle_stop(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    if bot.queues.get(guild_id).is_none() {
        return respond_error(ctx, &command, "Nada en reproducción").await;
    }

    bot.queues.remove(guild_id).await;
    if let Err(e) = bot.leave_voice_channel(ctx, guild_id).await {
        warn!("No se pudo salir del canal de voz: {:?}", e);
    }

    respond_embed(
        ctx,
        &command,
        embeds::create_status_embed(
            "⏹️ Música Detenida",
            "La reproducción se detuvo y la cola se vació.",
        ),
    )
    .await
}

async fn handle_queue(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let queue = match bot.queues.get(guild_id) {
        Some(queue) => queue,
        None => return respond_error(ctx, &command, "La cola está vacía").await,
    };

    let queue = queue.lock().await;
    if queue.is_empty() {
        drop(queue);
        return respond_error(ctx, &command, "La cola está vacía").await;
    }

    let embed = embeds::create_queue_embed(queue.current_track(), queue.upcoming(10), queue.len());
    drop(queue);

    respond_embed(ctx, &command, embed).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let queue = match bot.queues.get(guild_id) {
        Some(queue) => queue,
        None => return respond_error(ctx, &command, "Nada en reproducción").await,
    };

    let queue = queue.lock().await;
    let track = match queue.current_track() {
        Some(track) => track.clone(),
        None => {
            drop(queue);
            return respond_error(ctx, &command, "Nada en reproducción").await;
        }
    };
    drop(queue);

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_now_playing_embed(&track))
                    .components(buttons::create_player_controls()),
            ),
        )
        .await?;

    Ok(())
}

async fn handle_volume(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let level = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "level")
        .and_then(|opt| opt.value.as_i64())
        .ok_or_else(|| anyhow::anyhow!("Nivel no proporcionado"))?
        .clamp(0, 100) as u8;

    let queue = match bot.queues.get(guild_id) {
        Some(queue) => queue,
        None => return respond_error(ctx, &command, "Nada en reproducción").await,
    };

    queue.lock().await.set_volume(level).await;

    respond_embed(
        ctx,
        &command,
        embeds::create_status_embed(
            "🔊 Volumen Ajustado",
            &format!("Volumen configurado a **{}%**", level),
        ),
    )
    .await
}

async fn handle_loop(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let queue = match bot.queues.get(guild_id) {
        Some(queue) => queue,
        None => return respond_error(ctx, &command, "Nada en reproducción").await,
    };

    let looping = queue.lock().await.toggle_loop();
    let description = if looping {
        "La canción actual se repetirá al terminar."
    } else {
        "La cola avanzará normalmente."
    };

    respond_embed(
        ctx,
        &command,
        embeds::create_status_embed(
            if looping {
                "🔂 Repetición Activada"
            } else {
                "➡️ Repetición Desactivada"
            },
            description,
        ),
    )
    .await
}

async fn handle_shuffle(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let queue = match bot.queues.get(guild_id) {
        Some(queue) => queue,
        None => return respond_error(ctx, &command, "La cola está vacía").await,
    };

    queue.lock().await.shuffle();

    respond_embed(
        ctx,
        &command,
        embeds::create_status_embed("🔀 Cola Mezclada", "El orden de la cola se mezcló."),
    )
    .await
}

async fn handle_remove(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let position = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "position")
        .and_then(|opt| opt.value.as_i64())
        .ok_or_else(|| anyhow::anyhow!("Posición no proporcionada"))?;

    if position < 1 {
        return respond_error(ctx, &command, "La posición debe ser mayor que 0").await;
    }

    let queue = match bot.queues.get(guild_id) {
        Some(queue) => queue,
        None => return respond_error(ctx, &command, "La cola está vacía").await,
    };

    // La posición es 1-based sobre las próximas canciones, igual que /queue
    let removed = queue.lock().await.remove_upcoming(position as usize - 1);

    match removed {
        Some(track) => {
            respond_embed(
                ctx,
                &command,
                embeds::create_status_embed(
                    "❌ Canción Eliminada",
                    &format!("Se quitó de la cola: **{}**", track.title),
                ),
            )
            .await
        }
        None => respond_error(ctx, &command, "No hay ninguna canción en esa posición").await,
    }
}

async fn handle_clear(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let queue = match bot.queues.get(guild_id) {
        Some(queue) => queue,
        None => return respond_error(ctx, &command, "La cola está vacía").await,
    };

    queue.lock().await.clear().await;

    respond_embed(
        ctx,
        &command,
        embeds::create_status_embed("🗑️ Cola Vaciada", "Se eliminaron todas las canciones."),
    )
    .await
}

// Helpers

/// Canal de voz en el que está el usuario, vía caché de la guild
fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| anyhow::anyhow!("Guild no encontrada en caché"))?;

    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or_else(|| anyhow::anyhow!("Debes estar en un canal de voz"))?;

    Ok(channel_id)
}

async fn respond_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: serenity::builder::CreateEmbed,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;

    Ok(())
}

async fn respond_error(ctx: &Context, command: &CommandInteraction, message: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_error_embed(message))
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

/// Para respuestas después de un defer
async fn edit_with_error(ctx: &Context, command: &CommandInteraction, message: &str) -> Result<()> {
    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().embed(embeds::create_error_embed(message)),
        )
        .await?;

    Ok(())
}

async fn component_reply(
    ctx: &Context,
    component: &ComponentInteraction,
    message: &str,
) -> Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(message)
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}
