//! # Audio Module
//!
//! Núcleo de reproducción de Ritmo: la cola por guild y el reproductor.
//!
//! ## Arquitectura
//!
//! ### [`queue`] - Cola de reproducción
//! - Máquina de estados por guild: tracks ordenados + índice actual
//! - Avance automático al terminar o fallar un track
//! - Modos de repetición y mezcla (Fisher-Yates con el actual fijado)
//!
//! ### [`player`] - Reproductor
//! - Envuelve exactamente un handle de salida de songbird
//! - Control de volumen (0-100) y estado observable
//! - Emite eventos tipados `Finished`/`Errored` por un canal flume,
//!   sellados con la generación de reproducción que los produjo
//!
//! ### [`registry`] - Registro de colas
//! - Mapa `GuildId -> GuildQueue`, propiedad de la capa de despacho
//! - Creación perezosa en el primer `/play`, destrucción explícita
//! - Enruta los eventos del reproductor de vuelta a su cola
//!
//! El flujo de datos: comando del usuario → el despacho busca o crea la
//! cola → la cola muta su lista o delega en el reproductor → el
//! reproductor emite eventos de ciclo de vida → la cola avanza su índice
//! y vuelve a invocar al reproductor.

pub mod player;
pub mod queue;
pub mod registry;
