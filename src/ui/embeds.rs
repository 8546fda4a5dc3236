use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::queue::Track;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Ritmo";

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", duration_field(track.duration), true)
        .field(
            "👤 Solicitado por",
            format!("<@{}>", track.requested_by),
            true,
        );

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .url(&track.url)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!(
            "**{}** se ha agregado a la cola de reproducción",
            track.title
        ))
        .color(colors::INFO_BLUE)
        .field("⏱️ Duración", duration_field(track.duration), true)
        .field("📋 Posición", position.to_string(), true)
        .field(
            "👤 Solicitado por",
            format!("<@{}>", track.requested_by),
            true,
        );

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .url(&track.url)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(
            "🎵 Se reproducirá automáticamente si no hay música sonando",
        ))
}

/// Crea un embed con el estado de la cola: el track actual y los próximos
pub fn create_queue_embed(current: Option<&Track>, upcoming: &[Track], total: usize) -> CreateEmbed {
    let mut description = String::new();

    match current {
        Some(track) => {
            description.push_str(&format!(
                "▶️ **{}** ({})\n",
                track.title,
                duration_field(track.duration)
            ));
        }
        None => description.push_str("😴 Nada en reproducción\n"),
    }

    if upcoming.is_empty() {
        description.push_str("\nNo hay más canciones en la cola.");
    } else {
        description.push_str("\n**Próximas:**\n");
        for (index, track) in upcoming.iter().enumerate() {
            description.push_str(&format!(
                "`{}.` {} ({})\n",
                index + 1,
                track.title,
                duration_field(track.duration)
            ));
        }
    }

    CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .description(description)
        .color(colors::MUSIC_PURPLE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(format!(
            "{} • {} canciones en total",
            STANDARD_FOOTER, total
        )))
}

/// Embed simple de confirmación
pub fn create_status_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(title.to_string())
        .description(description.to_string())
        .color(colors::WARNING_ORANGE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de error para respuestas efímeras
pub fn create_error_embed(description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Error")
        .description(description.to_string())
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn duration_field(duration: Option<Duration>) -> String {
    match duration {
        Some(duration) => format_duration(duration),
        None => "🔴 En vivo".to_string(),
    }
}

/// Formatea una duración como m:ss o h:mm:ss
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
