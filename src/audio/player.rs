use async_trait::async_trait;
use songbird::{
    input::YoutubeDl,
    tracks::{PlayMode, ReadyState, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::audio::queue::Track;

/// Estado observable del reproductor, mapeado 1:1 del handle de songbird.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Idle,
    Playing,
    Paused,
    Buffering,
}

/// Evento de ciclo de vida del reproductor, etiquetado con la generación
/// de reproducción que lo produjo. Los eventos llegan por un canal y
/// pueden cruzarse con un skip o un nuevo play; la generación permite a
/// la cola descartar los que ya no corresponden al playback vigente.
#[derive(Debug, Clone)]
pub struct PlayerEvent {
    pub generation: u64,
    pub kind: PlayerEventKind,
}

/// `Finished` solo se emite por fin natural del track; un stop explícito
/// no lo produce.
#[derive(Debug, Clone)]
pub enum PlayerEventKind {
    Finished,
    Errored(String),
}

/// Contrato del reproductor que consume la cola. Ningún error cruza este
/// límite sin transformar: los fallos se reportan como booleanos y los
/// del stream activo llegan como [`PlayerEvent`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Playback: Send + Sync {
    /// Abre un stream de solo audio para `track.url` y comienza a
    /// reproducirlo, descartando el recurso anterior si lo había.
    async fn play(&mut self, track: &Track) -> bool;

    /// `false` si no hay recurso activo.
    async fn pause(&mut self) -> bool;

    /// `false` si no hay recurso activo.
    async fn resume(&mut self) -> bool;

    /// Detiene la salida sin emitir `Finished`.
    async fn stop(&mut self);

    /// Acota `level` a 0-100; aplica al recurso activo si existe, si no
    /// queda guardado para el próximo `play`.
    async fn set_volume(&mut self, level: u8);

    fn volume(&self) -> u8;

    async fn status(&self) -> PlayerStatus;

    /// Generación de reproducción vigente. Se incrementa con cada `play`
    /// y cada `stop`; un [`PlayerEvent`] con una generación menor viene
    /// de un recurso ya detenido o reemplazado.
    fn generation(&self) -> u64;

    /// Detiene y libera el recurso. Idempotente.
    async fn destroy(&mut self);
}

/// Reproductor real sobre el driver de voz de songbird.
///
/// La conexión (`Call`) es de propiedad externa: la capa de despacho la
/// crea y la cierra; aquí solo se usa para reproducir. Como máximo hay un
/// recurso activo; `play_only_input` descarta el anterior por sí solo.
pub struct TrackPlayer {
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
    handle: Option<TrackHandle>,
    volume: u8,
    generation: u64,
    events: flume::Sender<PlayerEvent>,
}

impl TrackPlayer {
    pub fn new(
        call: Arc<Mutex<Call>>,
        http: reqwest::Client,
        events: flume::Sender<PlayerEvent>,
        volume: u8,
    ) -> Self {
        Self {
            call,
            http,
            handle: None,
            volume: clamp_volume(volume),
            generation: 0,
            events,
        }
    }
}

#[async_trait]
impl Playback for TrackPlayer {
    async fn play(&mut self, track: &Track) -> bool {
        // El recurso anterior queda obsoleto junto con sus eventos.
        self.generation += 1;

        let input = YoutubeDl::new(self.http.clone(), track.url.clone());

        let mut call = self.call.lock().await;
        let handle = call.play_only_input(input.into());

        if let Err(e) = handle.set_volume(volume_scale(self.volume)) {
            debug!("No se pudo aplicar el volumen inicial: {:?}", e);
        }

        // El puente muere con el track; no quedan listeners colgando.
        let bridge = LifecycleBridge {
            events: self.events.clone(),
            generation: self.generation,
        };
        if let Err(e) = handle.add_event(Event::Track(TrackEvent::End), bridge.clone()) {
            error!("❌ No se pudo registrar el evento de fin de track: {:?}", e);
            let _ = handle.stop();
            return false;
        }
        if let Err(e) = handle.add_event(Event::Track(TrackEvent::Error), bridge) {
            error!("❌ No se pudo registrar el evento de error: {:?}", e);
            let _ = handle.stop();
            return false;
        }

        self.handle = Some(handle);
        true
    }

    async fn pause(&mut self) -> bool {
        match &self.handle {
            Some(handle) => handle.pause().is_ok(),
            None => false,
        }
    }

    async fn resume(&mut self) -> bool {
        match &self.handle {
            Some(handle) => handle.play().is_ok(),
            None => false,
        }
    }

    async fn stop(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.stop() {
                debug!("Stop sobre un track ya terminado: {:?}", e);
            }
        }
    }

    async fn set_volume(&mut self, level: u8) {
        self.volume = clamp_volume(level);
        if let Some(handle) = &self.handle {
            if let Err(e) = handle.set_volume(volume_scale(self.volume)) {
                debug!("No se pudo aplicar el volumen: {:?}", e);
            }
        }
    }

    fn volume(&self) -> u8 {
        self.volume
    }

    async fn status(&self) -> PlayerStatus {
        let handle = match &self.handle {
            Some(handle) => handle,
            None => return PlayerStatus::Idle,
        };

        match handle.get_info().await {
            Ok(state) => {
                if matches!(state.ready, ReadyState::Preparing) {
                    return PlayerStatus::Buffering;
                }
                match state.playing {
                    PlayMode::Play => PlayerStatus::Playing,
                    PlayMode::Pause => PlayerStatus::Paused,
                    _ => PlayerStatus::Idle,
                }
            }
            // El handle ya no existe en el driver
            Err(_) => PlayerStatus::Idle,
        }
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    async fn destroy(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.handle.take() {
            let _ = handle.stop();
        }
    }
}

/// Reenvía los eventos terminales del track de songbird como
/// [`PlayerEvent`] tipados por el canal del reproductor, sellados con la
/// generación del track que los produjo. Un `PlayMode::Stop` (stop
/// explícito) se ignora a propósito.
#[derive(Clone)]
struct LifecycleBridge {
    events: flume::Sender<PlayerEvent>,
    generation: u64,
}

#[async_trait]
impl VoiceEventHandler for LifecycleBridge {
    async fn act(&self, context: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track([(state, _)]) = context {
            let kind = match &state.playing {
                PlayMode::End => Some(PlayerEventKind::Finished),
                PlayMode::Errored(e) => Some(PlayerEventKind::Errored(e.to_string())),
                _ => None,
            };

            if let Some(kind) = kind {
                let event = PlayerEvent {
                    generation: self.generation,
                    kind,
                };
                if self.events.send(event).is_err() {
                    debug!("Cola ya descartada, evento de reproductor ignorado");
                }
            }
        }

        None
    }
}

fn clamp_volume(level: u8) -> u8 {
    level.min(100)
}

/// Volumen de usuario (0-100) a ganancia de songbird (0.0-1.0).
fn volume_scale(level: u8) -> f32 {
    f32::from(level) / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn volume_is_clamped_to_valid_range() {
        assert_eq!(clamp_volume(0), 0);
        assert_eq!(clamp_volume(50), 50);
        assert_eq!(clamp_volume(100), 100);
        assert_eq!(clamp_volume(255), 100);
    }

    #[test]
    fn volume_scales_to_unit_gain() {
        assert_eq!(volume_scale(0), 0.0);
        assert_eq!(volume_scale(50), 0.5);
        assert_eq!(volume_scale(100), 1.0);
    }
}
