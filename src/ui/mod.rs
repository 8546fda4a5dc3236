//! Presentación: embeds y botones de control del reproductor.

pub mod buttons;
pub mod embeds;
