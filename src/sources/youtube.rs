use async_process::Command;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::{SourceError, TrackMetadata};

/// Cliente para interactuar con YouTube vía yt-dlp
pub struct YouTubeClient {
    // Limitar requests concurrentes para evitar rate limiting
    rate_limiter: tokio::sync::Semaphore,
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    duration: Option<f64>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
}

impl YouTubeClient {
    pub fn new() -> Self {
        Self {
            rate_limiter: tokio::sync::Semaphore::new(3),
        }
    }

    /// Resuelve una consulta del usuario: URL directa o término de búsqueda.
    pub async fn resolve(&self, query: &str) -> Result<TrackMetadata, SourceError> {
        if query.starts_with("http://") || query.starts_with("https://") {
            if !Self::is_youtube_url(query) {
                return Err(SourceError::InvalidUrl(query.to_string()));
            }
            return self.get_info(query).await;
        }

        self.search_metadata(query, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::NoResults(query.to_string()))
    }

    /// Obtiene información de una URL específica
    pub async fn get_info(&self, url: &str) -> Result<TrackMetadata, SourceError> {
        let _permit = self.rate_limiter.acquire().await?;

        debug!("📊 Obteniendo info de: {}", url);

        let output = Command::new("yt-dlp")
            .args(["--no-playlist", "--dump-json", "--skip-download", "--no-warnings", url])
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::YtDlp(error.into_owned()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let info: YtDlpInfo = serde_json::from_str(&stdout)?;

        info_to_metadata(info).ok_or_else(|| SourceError::NoResults(url.to_string()))
    }

    /// Busca videos en YouTube
    pub async fn search_metadata(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackMetadata>, SourceError> {
        let _permit = self.rate_limiter.acquire().await?;

        info!("🔍 Buscando en YouTube: {}", query);

        let search_query = format!("ytsearch{}:{}", limit, query);

        let output = Command::new("yt-dlp")
            .args([
                "--no-playlist",
                "--dump-json",
                "--flat-playlist",
                "--skip-download",
                "--no-warnings",
                search_query.as_str(),
            ])
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::YtDlp(error.into_owned()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let results = stdout
            .lines()
            .filter_map(|line| serde_json::from_str::<YtDlpInfo>(line).ok())
            .filter_map(info_to_metadata)
            .collect();

        Ok(results)
    }

    /// Verifica si una URL es válida para YouTube
    pub fn is_youtube_url(url: &str) -> bool {
        let youtube_regex = Regex::new(
            r"^(https?://)?(www\.)?(youtube\.com/(watch\?v=|embed/|v/)|youtu\.be/|music\.youtube\.com/)"
        ).unwrap();

        youtube_regex.is_match(url)
    }
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Convierte YtDlpInfo a TrackMetadata. En las búsquedas con
/// --flat-playlist la URL viene en `url` en lugar de `webpage_url`.
fn info_to_metadata(info: YtDlpInfo) -> Option<TrackMetadata> {
    let url = info.webpage_url.or(info.url)?;

    Some(TrackMetadata {
        title: info.title,
        duration: info.duration.map(Duration::from_secs_f64),
        thumbnail: info.thumbnail,
        url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_url_detection() {
        assert!(YouTubeClient::is_youtube_url(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(YouTubeClient::is_youtube_url(
            "https://youtu.be/dQw4w9WgXcQ"
        ));
        assert!(YouTubeClient::is_youtube_url(
            "https://music.youtube.com/watch?v=test"
        ));
        assert!(!YouTubeClient::is_youtube_url("https://example.com/video"));
    }

    #[test]
    fn test_parse_ytdlp_line() {
        let line = r#"{"title":"Una Canción","duration":215.0,"thumbnail":"https://i.ytimg.com/vi/x/hq.jpg","webpage_url":"https://www.youtube.com/watch?v=x"}"#;
        let info: YtDlpInfo = serde_json::from_str(line).unwrap();
        let meta = info_to_metadata(info).unwrap();

        assert_eq!(meta.title, "Una Canción");
        assert_eq!(meta.duration, Some(Duration::from_secs(215)));
        assert_eq!(meta.url, "https://www.youtube.com/watch?v=x");
    }

    #[test]
    fn test_flat_playlist_entry_uses_url_field() {
        let line = r#"{"title":"Otra","url":"https://www.youtube.com/watch?v=y"}"#;
        let info: YtDlpInfo = serde_json::from_str(line).unwrap();
        let meta = info_to_metadata(info).unwrap();

        assert_eq!(meta.url, "https://www.youtube.com/watch?v=y");
        assert_eq!(meta.duration, None);
    }
}
