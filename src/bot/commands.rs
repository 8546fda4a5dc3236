use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        pause_command(),
        resume_command(),
        skip_command(),
        stop_command(),
        queue_command(),
        nowplaying_command(),
        volume_command(),
        loop_command(),
        shuffle_command(),
        remove_command(),
        clear_command(),
    ]
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción de YouTube")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta la canción actual")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción y limpia la cola")
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Muestra la cola de reproducción")
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Muestra la canción actual")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop").description("Activa o desactiva la repetición de la canción actual")
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Mezcla la cola de reproducción")
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Elimina una canción de la cola")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "position",
                "Posición en la cola (1 es la primera)",
            )
            .min_int_value(1)
            .required(true),
        )
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Vacía la cola sin salir del canal de voz")
}

// Comandos de audio

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Ajusta el volumen (0-100)")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Nivel de volumen")
                .min_int_value(0)
                .max_int_value(100)
                .required(true),
        )
}
