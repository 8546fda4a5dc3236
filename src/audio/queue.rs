use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serenity::model::id::UserId;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::audio::player::{Playback, PlayerEvent, PlayerEventKind, PlayerStatus};

/// Un track listo para reproducir. Inmutable una vez encolado.
#[derive(Debug, Clone)]
pub struct Track {
    pub title: String,
    pub url: String,
    pub duration: Option<Duration>,
    pub thumbnail: Option<String>,
    pub requested_by: UserId,
    pub added_at: DateTime<Utc>,
}

impl Track {
    pub fn new(
        title: String,
        url: String,
        duration: Option<Duration>,
        thumbnail: Option<String>,
        requested_by: UserId,
    ) -> Self {
        Self {
            title,
            url,
            duration,
            thumbnail,
            requested_by,
            added_at: Utc::now(),
        }
    }
}

/// Cola de reproducción de una guild.
///
/// Máquina de estados sobre `tracks` + `current_index`: `None` significa
/// "nada en reproducción"; cuando es `Some(i)`, `i` siempre es un índice
/// válido mientras haya reproducción activa. La cola posee en exclusiva su
/// [`Playback`] y reacciona a los eventos `Finished`/`Errored` del
/// reproductor para avanzar.
pub struct GuildQueue {
    tracks: Vec<Track>,
    current_index: Option<usize>,
    looping: bool,
    player: Box<dyn Playback>,
    max_size: usize,
    destroyed: bool,
}

impl GuildQueue {
    pub fn new(player: Box<dyn Playback>, max_size: usize) -> Self {
        Self {
            tracks: Vec::new(),
            current_index: None,
            looping: false,
            player,
            max_size,
            destroyed: false,
        }
    }

    /// Agrega un track al final de la cola. No cambia `current_index`.
    pub fn add_track(&mut self, track: Track) -> Result<()> {
        if self.destroyed {
            anyhow::bail!("La cola ya fue destruida");
        }
        if self.tracks.len() >= self.max_size {
            anyhow::bail!("La cola está llena (máximo {} canciones)", self.max_size);
        }

        info!("➕ Agregado a la cola: {}", track.title);
        self.tracks.push(track);

        Ok(())
    }

    /// Inicia (o reinicia) la reproducción del track actual. Si no había
    /// nada en reproducción, comienza por el primero. Devuelve `false` si
    /// la cola está vacía o el reproductor no pudo abrir el stream; en ese
    /// caso no hay retry, el llamador decide.
    pub async fn play(&mut self) -> bool {
        if self.destroyed || self.tracks.is_empty() {
            return false;
        }

        if self.current_index.is_none() {
            self.current_index = Some(0);
        }

        self.play_current().await
    }

    /// Salta el track actual: detiene la salida y fuerza el avance,
    /// ignorando el modo de repetición. Saltar durante loop avanza
    /// igualmente; para repetir hay que dejar que el track termine solo.
    pub async fn skip(&mut self) -> bool {
        if self.destroyed {
            return false;
        }

        self.player.stop().await;
        self.advance().await
    }

    /// Reacciona a un evento de ciclo de vida del reproductor. Los
    /// eventos llegan por un canal y pueden cruzarse con un skip o un
    /// nuevo play que ya movió la cola; los de una generación anterior
    /// se descartan para no avanzar dos veces.
    pub async fn handle_player_event(&mut self, event: PlayerEvent) {
        if self.destroyed {
            return;
        }
        if event.generation != self.player.generation() {
            debug!(
                "Evento de la generación {} descartado (vigente: {})",
                event.generation,
                self.player.generation()
            );
            return;
        }

        match event.kind {
            PlayerEventKind::Finished => {
                if self.looping && self.current_track().is_some() {
                    info!("🔂 Repitiendo track");
                    self.play_current().await;
                } else {
                    self.advance().await;
                }
            }
            PlayerEventKind::Errored(detail) => {
                // Un track que falla se abandona; la música sigue.
                warn!("⚠️ Error de reproducción, saltando track: {}", detail);
                self.advance().await;
            }
        }
    }

    /// Mezcla la cola con Fisher-Yates, dejando el track en reproducción
    /// fijado en la posición 0. No hace nada con 0 o 1 tracks.
    pub fn shuffle(&mut self) {
        if self.destroyed || self.tracks.len() <= 1 {
            return;
        }

        let mut rng = rand::thread_rng();
        match self.current_index {
            Some(index) => {
                self.tracks.swap(0, index);
                self.current_index = Some(0);
                self.tracks[1..].shuffle(&mut rng);
            }
            None => self.tracks.shuffle(&mut rng),
        }

        info!("🔀 Cola mezclada");
    }

    /// Elimina un track por índice. Devuelve `None` si el índice está
    /// fuera de rango o apunta al track en reproducción.
    pub fn remove_track(&mut self, index: usize) -> Option<Track> {
        if self.destroyed || index >= self.tracks.len() {
            return None;
        }
        if self.current_index == Some(index) {
            return None;
        }

        let removed = self.tracks.remove(index);
        if let Some(current) = self.current_index {
            if index < current {
                self.current_index = Some(current - 1);
            }
        }

        debug!("❌ Track eliminado en posición {}", index);
        Some(removed)
    }

    /// Elimina por posición relativa a las próximas canciones (la vista
    /// que muestra el comando de cola), no al índice absoluto.
    pub fn remove_upcoming(&mut self, offset: usize) -> Option<Track> {
        let start = match self.current_index {
            Some(index) => index + 1,
            None => 0,
        };
        self.remove_track(start + offset)
    }

    /// Vacía la cola y detiene el reproductor. Válido en cualquier estado.
    pub async fn clear(&mut self) {
        if self.destroyed {
            return;
        }

        self.tracks.clear();
        self.current_index = None;
        self.player.stop().await;
        info!("🗑️ Cola limpiada");
    }

    /// Detiene y libera el reproductor. Terminal: toda operación posterior
    /// es un no-op que devuelve el valor de fallo.
    pub async fn destroy(&mut self) {
        if self.destroyed {
            return;
        }

        self.player.destroy().await;
        self.tracks.clear();
        self.current_index = None;
        self.destroyed = true;
    }

    pub async fn pause(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        self.player.pause().await
    }

    pub async fn resume(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        self.player.resume().await
    }

    /// Delegación pura al reproductor; no cambia el estado de la cola.
    pub async fn set_volume(&mut self, level: u8) {
        if self.destroyed {
            return;
        }
        self.player.set_volume(level).await;
    }

    pub fn volume(&self) -> u8 {
        self.player.volume()
    }

    pub fn toggle_loop(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        self.looping = !self.looping;
        self.looping
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|index| self.tracks.get(index))
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Los próximos tracks después del actual, hasta `limit`.
    pub fn upcoming(&self, limit: usize) -> &[Track] {
        let start = match self.current_index {
            Some(index) => index + 1,
            None => 0,
        };
        let start = start.min(self.tracks.len());
        let end = (start + limit).min(self.tracks.len());
        &self.tracks[start..end]
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub async fn is_playing(&self) -> bool {
        self.player.status().await == PlayerStatus::Playing
    }

    pub async fn is_paused(&self) -> bool {
        self.player.status().await == PlayerStatus::Paused
    }

    /// Avanza al siguiente índice y lo reproduce. Pasado el final, la cola
    /// queda en reposo (`current_index = None`).
    async fn advance(&mut self) -> bool {
        let next = match self.current_index {
            Some(index) => index + 1,
            None => 0,
        };

        if next < self.tracks.len() {
            self.current_index = Some(next);
            self.play_current().await
        } else {
            self.current_index = None;
            info!("📭 Cola agotada");
            false
        }
    }

    async fn play_current(&mut self) -> bool {
        let track = match self.current_index.and_then(|index| self.tracks.get(index)) {
            Some(track) => track.clone(),
            None => return false,
        };

        info!("🎵 Reproduciendo: {}", track.title);
        self.player.play(&track).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::player::MockPlayback;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Reproductor falso que registra los títulos que recibe.
    #[derive(Default)]
    struct FakePlayer {
        played: Arc<Mutex<Vec<String>>>,
        stops: Arc<AtomicUsize>,
        destroyed: Arc<AtomicBool>,
        fail_play: bool,
        volume: u8,
        generation: u64,
    }

    impl FakePlayer {
        fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
            let player = Self {
                volume: 50,
                ..Self::default()
            };
            let played = player.played.clone();
            (player, played)
        }
    }

    #[async_trait::async_trait]
    impl Playback for FakePlayer {
        async fn play(&mut self, track: &Track) -> bool {
            self.generation += 1;
            if self.fail_play {
                return false;
            }
            self.played.lock().unwrap().push(track.title.clone());
            true
        }

        async fn pause(&mut self) -> bool {
            true
        }

        async fn resume(&mut self) -> bool {
            true
        }

        async fn stop(&mut self) {
            self.generation += 1;
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        async fn set_volume(&mut self, level: u8) {
            self.volume = level.min(100);
        }

        fn volume(&self) -> u8 {
            self.volume
        }

        async fn status(&self) -> PlayerStatus {
            PlayerStatus::Idle
        }

        fn generation(&self) -> u64 {
            self.generation
        }

        async fn destroy(&mut self) {
            self.generation += 1;
            self.destroyed.store(true, Ordering::SeqCst);
        }
    }

    fn track(title: &str) -> Track {
        Track::new(
            title.to_string(),
            format!("https://www.youtube.com/watch?v={}", title),
            Some(Duration::from_secs(180)),
            None,
            UserId::new(42),
        )
    }

    fn queue_with_fake() -> (GuildQueue, Arc<Mutex<Vec<String>>>) {
        let (player, played) = FakePlayer::new();
        (GuildQueue::new(Box::new(player), 1000), played)
    }

    fn current_index(queue: &GuildQueue) -> Option<usize> {
        queue.current_index
    }

    /// Evento con la generación vigente, como lo emitiría el playback actual.
    fn finished(queue: &GuildQueue) -> PlayerEvent {
        PlayerEvent {
            generation: queue.player.generation(),
            kind: PlayerEventKind::Finished,
        }
    }

    fn errored(queue: &GuildQueue, detail: &str) -> PlayerEvent {
        PlayerEvent {
            generation: queue.player.generation(),
            kind: PlayerEventKind::Errored(detail.to_string()),
        }
    }

    #[test]
    fn add_preserves_fifo_order() {
        let (mut queue, _) = queue_with_fake();
        for title in ["a", "b", "c", "d"] {
            queue.add_track(track(title)).unwrap();
        }

        assert_eq!(queue.len(), 4);
        let titles: Vec<_> = queue.tracks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c", "d"]);
        assert_eq!(current_index(&queue), None);
    }

    #[test]
    fn add_fails_when_full() {
        let (player, _) = FakePlayer::new();
        let mut queue = GuildQueue::new(Box::new(player), 2);
        queue.add_track(track("a")).unwrap();
        queue.add_track(track("b")).unwrap();

        assert!(queue.add_track(track("c")).is_err());
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn play_on_empty_queue_never_touches_player() {
        // MockPlayback sin expectativas: cualquier llamada lo haría fallar.
        let mut queue = GuildQueue::new(Box::new(MockPlayback::new()), 1000);

        assert!(!queue.play().await);
        assert_eq!(current_index(&queue), None);
    }

    #[tokio::test]
    async fn full_playthrough_scenario() {
        let (mut queue, played) = queue_with_fake();
        for title in ["A", "B", "C"] {
            queue.add_track(track(title)).unwrap();
        }

        assert!(queue.play().await);
        assert_eq!(current_index(&queue), Some(0));

        queue.handle_player_event(finished(&queue)).await;
        assert_eq!(current_index(&queue), Some(1));

        assert!(queue.skip().await);
        assert_eq!(current_index(&queue), Some(2));

        queue.handle_player_event(finished(&queue)).await;
        assert_eq!(current_index(&queue), None);

        assert_eq!(*played.lock().unwrap(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn looping_replays_same_index() {
        let (mut queue, played) = queue_with_fake();
        queue.add_track(track("A")).unwrap();
        queue.add_track(track("B")).unwrap();

        assert!(queue.play().await);
        assert!(queue.toggle_loop());

        queue.handle_player_event(finished(&queue)).await;
        assert_eq!(current_index(&queue), Some(0));
        assert_eq!(*played.lock().unwrap(), vec!["A", "A"]);
    }

    #[tokio::test]
    async fn skip_advances_even_while_looping() {
        let (mut queue, played) = queue_with_fake();
        queue.add_track(track("A")).unwrap();
        queue.add_track(track("B")).unwrap();

        assert!(queue.play().await);
        queue.toggle_loop();

        assert!(queue.skip().await);
        assert_eq!(current_index(&queue), Some(1));
        assert_eq!(*played.lock().unwrap(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn skip_without_next_track_goes_idle() {
        let (mut queue, _) = queue_with_fake();
        queue.add_track(track("A")).unwrap();

        assert!(queue.play().await);
        assert!(!queue.skip().await);
        assert_eq!(current_index(&queue), None);
    }

    #[tokio::test]
    async fn skip_from_idle_starts_first_track() {
        let (mut queue, played) = queue_with_fake();
        queue.add_track(track("A")).unwrap();

        assert!(queue.skip().await);
        assert_eq!(current_index(&queue), Some(0));
        assert_eq!(*played.lock().unwrap(), vec!["A"]);
    }

    #[tokio::test]
    async fn error_event_forces_advance_without_retry() {
        let (mut queue, played) = queue_with_fake();
        queue.add_track(track("A")).unwrap();
        queue.add_track(track("B")).unwrap();

        assert!(queue.play().await);
        queue
            .handle_player_event(errored(&queue, "stream caído"))
            .await;

        assert_eq!(current_index(&queue), Some(1));
        assert_eq!(*played.lock().unwrap(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn error_event_advances_even_while_looping() {
        let (mut queue, _) = queue_with_fake();
        queue.add_track(track("A")).unwrap();
        queue.add_track(track("B")).unwrap();

        assert!(queue.play().await);
        queue.toggle_loop();
        queue
            .handle_player_event(errored(&queue, "403"))
            .await;

        assert_eq!(current_index(&queue), Some(1));
    }

    #[test]
    fn shuffle_is_noop_with_one_track() {
        let (mut queue, _) = queue_with_fake();
        queue.add_track(track("solo")).unwrap();

        queue.shuffle();

        assert_eq!(queue.tracks()[0].title, "solo");
        assert_eq!(current_index(&queue), None);
    }

    #[tokio::test]
    async fn shuffle_pins_current_track_at_zero() {
        let (mut queue, _) = queue_with_fake();
        for index in 0..8 {
            queue.add_track(track(&format!("t{}", index))).unwrap();
        }

        assert!(queue.play().await);
        assert!(queue.skip().await);
        assert!(queue.skip().await);
        assert_eq!(current_index(&queue), Some(2));

        let before: HashSet<String> =
            queue.tracks().iter().map(|t| t.title.clone()).collect();

        queue.shuffle();

        assert_eq!(current_index(&queue), Some(0));
        assert_eq!(queue.tracks()[0].title, "t2");
        let after: HashSet<String> =
            queue.tracks().iter().map(|t| t.title.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(queue.len(), 8);
    }

    #[tokio::test]
    async fn clear_then_play_fails_and_stays_idle() {
        let (mut queue, _) = queue_with_fake();
        queue.add_track(track("A")).unwrap();
        assert!(queue.play().await);

        queue.clear().await;

        assert!(!queue.play().await);
        assert_eq!(current_index(&queue), None);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn remove_refuses_current_and_shifts_earlier_indices() {
        let (mut queue, _) = queue_with_fake();
        for title in ["A", "B", "C"] {
            queue.add_track(track(title)).unwrap();
        }

        assert!(queue.play().await);
        assert!(queue.skip().await);
        assert_eq!(current_index(&queue), Some(1));

        // El track en reproducción no se puede quitar.
        assert!(queue.remove_track(1).is_none());

        // Quitar uno anterior desplaza el índice actual.
        let removed = queue.remove_track(0).unwrap();
        assert_eq!(removed.title, "A");
        assert_eq!(current_index(&queue), Some(0));
        assert_eq!(queue.current_track().unwrap().title, "B");
    }

    #[tokio::test]
    async fn remove_upcoming_is_relative_to_current() {
        let (mut queue, _) = queue_with_fake();
        for title in ["A", "B", "C"] {
            queue.add_track(track(title)).unwrap();
        }

        assert!(queue.play().await);

        // La posición 0 de "próximas" es B, no el track en reproducción.
        let removed = queue.remove_upcoming(0).unwrap();
        assert_eq!(removed.title, "B");
        assert_eq!(queue.current_track().unwrap().title, "A");
        assert!(queue.remove_upcoming(5).is_none());
    }

    #[tokio::test]
    async fn upcoming_lists_tracks_after_current() {
        let (mut queue, _) = queue_with_fake();
        for title in ["A", "B", "C", "D"] {
            queue.add_track(track(title)).unwrap();
        }

        // Sin reproducción activa, el listado empieza por el principio.
        let titles: Vec<_> = queue.upcoming(2).iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);

        assert!(queue.play().await);
        let titles: Vec<_> = queue.upcoming(10).iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "C", "D"]);
    }

    #[tokio::test]
    async fn play_failure_is_reported_to_caller() {
        let (mut player, _) = FakePlayer::new();
        player.fail_play = true;
        let mut queue = GuildQueue::new(Box::new(player), 1000);
        queue.add_track(track("A")).unwrap();

        assert!(!queue.play().await);
    }

    #[tokio::test]
    async fn destroyed_queue_refuses_everything() {
        let (player, played) = FakePlayer::new();
        let destroyed_flag = player.destroyed.clone();
        let mut queue = GuildQueue::new(Box::new(player), 1000);
        queue.add_track(track("A")).unwrap();

        queue.destroy().await;
        assert!(destroyed_flag.load(Ordering::SeqCst));

        assert!(queue.add_track(track("B")).is_err());
        assert!(!queue.play().await);
        assert!(!queue.skip().await);
        assert!(queue.is_empty());
        assert!(played.lock().unwrap().is_empty());

        // destroy es idempotente
        queue.destroy().await;
    }

    #[tokio::test]
    async fn stale_error_event_after_skip_is_discarded() {
        let (mut queue, played) = queue_with_fake();
        for title in ["A", "B", "C"] {
            queue.add_track(track(title)).unwrap();
        }

        assert!(queue.play().await);
        // A falla y su evento queda pendiente en el canal...
        let stale = errored(&queue, "stream caído");
        // ...pero el skip del usuario llega a la cola primero.
        assert!(queue.skip().await);
        assert_eq!(current_index(&queue), Some(1));

        queue.handle_player_event(stale).await;

        // El evento de A no corta a B: sin doble avance.
        assert_eq!(current_index(&queue), Some(1));
        assert_eq!(*played.lock().unwrap(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn stale_finished_event_after_restart_is_discarded() {
        let (mut queue, played) = queue_with_fake();
        queue.add_track(track("A")).unwrap();

        assert!(queue.play().await);
        let stale = finished(&queue);
        // Reiniciar el mismo track invalida el evento pendiente.
        assert!(queue.play().await);

        queue.handle_player_event(stale).await;

        assert_eq!(current_index(&queue), Some(0));
        assert_eq!(*played.lock().unwrap(), vec!["A", "A"]);
    }

    #[tokio::test]
    async fn stale_event_cannot_restart_a_drained_queue() {
        let (mut queue, played) = queue_with_fake();
        queue.add_track(track("A")).unwrap();

        assert!(queue.play().await);
        let stale = errored(&queue, "403");
        // Skip sin siguiente track deja la cola en reposo.
        assert!(!queue.skip().await);
        assert_eq!(current_index(&queue), None);

        queue.handle_player_event(stale).await;

        // El evento viejo no rearranca la reproducción desde cero.
        assert_eq!(current_index(&queue), None);
        assert_eq!(*played.lock().unwrap(), vec!["A"]);
    }
}
