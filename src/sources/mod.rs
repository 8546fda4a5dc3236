//! Resolución de metadata de tracks.
//!
//! La capa de despacho resuelve aquí la metadata (título, duración,
//! miniatura, URL canónica) ANTES de encolar: la cola nunca consulta
//! la fuente por sí misma.

pub mod youtube;

use std::time::Duration;
use thiserror::Error;

pub use youtube::YouTubeClient;

/// Fallos al resolver un track contra la fuente externa.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("URL inválida: {0}")]
    InvalidUrl(String),
    #[error("yt-dlp falló: {0}")]
    YtDlp(String),
    #[error("error de E/S ejecutando yt-dlp: {0}")]
    Io(#[from] std::io::Error),
    #[error("no se pudo parsear la respuesta de yt-dlp: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("sin resultados para: {0}")]
    NoResults(String),
    #[error("límite de concurrencia no disponible: {0}")]
    Semaphore(#[from] tokio::sync::AcquireError),
}

/// Metadata de un track, ya resuelta y lista para encolar.
#[derive(Debug, Clone)]
pub struct TrackMetadata {
    pub title: String,
    pub duration: Option<Duration>,
    pub thumbnail: Option<String>,
    pub url: String,
}
