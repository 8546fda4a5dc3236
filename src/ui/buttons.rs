use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

/// IDs personalizados para los botones
pub mod button_ids {
    pub const PLAY_PAUSE: &str = "music_play_pause";
    pub const SKIP: &str = "music_skip";
    pub const STOP: &str = "music_stop";
    pub const QUEUE: &str = "music_queue";
}

/// Crea la fila de controles principales del reproductor
pub fn create_player_controls() -> Vec<CreateActionRow> {
    let play_pause_btn = CreateButton::new(button_ids::PLAY_PAUSE)
        .emoji('⏯')
        .style(ButtonStyle::Primary);

    let skip_btn = CreateButton::new(button_ids::SKIP)
        .emoji('⏭')
        .style(ButtonStyle::Secondary);

    let stop_btn = CreateButton::new(button_ids::STOP)
        .emoji('⏹')
        .style(ButtonStyle::Danger);

    let queue_btn = CreateButton::new(button_ids::QUEUE)
        .emoji('📋')
        .style(ButtonStyle::Success);

    vec![CreateActionRow::Buttons(vec![
        play_pause_btn,
        skip_btn,
        stop_btn,
        queue_btn,
    ])]
}
