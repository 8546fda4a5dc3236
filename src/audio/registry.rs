use dashmap::DashMap;
use serenity::model::id::GuildId;
use songbird::Call;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::audio::player::{PlayerEvent, TrackPlayer};
use crate::audio::queue::GuildQueue;

/// Mapa proceso-global de colas por guild.
///
/// Lo posee la capa de despacho y se inyecta en los handlers: las colas
/// se crean perezosamente con el primer `/play` y se eliminan con `/stop`
/// o cuando el bot sale del canal de voz. Las colas de distintas guilds
/// son totalmente independientes.
pub struct QueueRegistry {
    queues: DashMap<GuildId, Arc<Mutex<GuildQueue>>>,
    http: reqwest::Client,
    default_volume: u8,
    max_queue_size: usize,
}

impl QueueRegistry {
    pub fn new(default_volume: u8, max_queue_size: usize) -> Self {
        Self {
            queues: DashMap::new(),
            http: reqwest::Client::new(),
            default_volume,
            max_queue_size,
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Mutex<GuildQueue>>> {
        self.queues.get(&guild_id).map(|queue| queue.clone())
    }

    /// Crea la cola de una guild sobre una conexión de voz ya establecida
    /// y arranca la tarea que enruta los eventos del reproductor hacia
    /// ella. Reemplaza cualquier cola previa de la misma guild.
    pub fn create(
        self: Arc<Self>,
        guild_id: GuildId,
        call: Arc<Mutex<Call>>,
    ) -> Arc<Mutex<GuildQueue>> {
        let (events_tx, events_rx) = flume::unbounded();
        let player = TrackPlayer::new(call, self.http.clone(), events_tx, self.default_volume);
        let queue = Arc::new(Mutex::new(GuildQueue::new(
            Box::new(player),
            self.max_queue_size,
        )));

        self.queues.insert(guild_id, queue.clone());
        info!("🆕 Cola creada para guild {}", guild_id);

        tokio::spawn(async move {
            route_player_events(self, guild_id, events_rx).await;
        });

        queue
    }

    /// Destruye y elimina la cola de una guild. Inofensivo si no existe.
    pub async fn remove(&self, guild_id: GuildId) {
        if let Some((_, queue)) = self.queues.remove(&guild_id) {
            queue.lock().await.destroy().await;
            info!("🗑️ Cola destruida para guild {}", guild_id);
        }
    }
}

/// Entrega a su cola los eventos de ciclo de vida de un reproductor.
/// Termina sola cuando el reproductor (el emisor del canal) se descarta.
async fn route_player_events(
    registry: Arc<QueueRegistry>,
    guild_id: GuildId,
    events: flume::Receiver<PlayerEvent>,
) {
    while let Ok(event) = events.recv_async().await {
        match registry.get(guild_id) {
            Some(queue) => queue.lock().await.handle_player_event(event).await,
            None => debug!(
                "Evento de reproductor para una cola ya eliminada: guild {}",
                guild_id
            ),
        }
    }
}
