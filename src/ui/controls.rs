use iced::widget::{button, container, row, slider, text, Column, Row};
use iced::{Alignment, Element, Length};

use crate::config::MAX_VOLUME;
use crate::session::PlayerSession;

#[derive(Debug, Clone)]
pub enum ControlMessage {
    OpenFile,
    PlayPause,
    Previous,
    Next,
    /// Fraction of the media length.
    Seek(f32),
    VolumeChanged(u8),
}

/// Format seconds as MM:SS, or `--:--` when the time is unknown.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "--:--".to_string();
    }
    let total_secs = seconds.max(0.0) as u64;
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    format!("{mins:02}:{secs:02}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeLevel {
    Off,
    Down,
    Up,
}

impl VolumeLevel {
    pub fn from_volume(volume: u8) -> Self {
        match volume {
            0 => VolumeLevel::Off,
            1..=50 => VolumeLevel::Down,
            _ => VolumeLevel::Up,
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            VolumeLevel::Off => "🔇",
            VolumeLevel::Down => "🔉",
            VolumeLevel::Up => "🔊",
        }
    }
}

/// Build the transport controls view.
pub fn view_controls(session: &PlayerSession) -> Element<'_, ControlMessage> {
    let play_label = if session.is_paused() { "Play" } else { "Pause" };
    let loaded = session.duration.is_some();

    let open_btn = button(text("Open File")).on_press(ControlMessage::OpenFile);
    let prev_btn = button(text("Prev"))
        .on_press_maybe(session.playlist.can_previous().then_some(ControlMessage::Previous));
    let play_btn =
        button(text(play_label)).on_press_maybe(loaded.then_some(ControlMessage::PlayPause));
    let next_btn = button(text("Next"))
        .on_press_maybe(session.playlist.can_next().then_some(ControlMessage::Next));

    let elapsed = text(format_time(session.elapsed())).size(14);
    let remaining = text(format!("-{}", format_time(session.remaining()))).size(14);
    let progress = slider(0.0..=1.0, session.progress(), ControlMessage::Seek).step(0.001);

    let volume = session.preferences.volume;
    let volume_icon = text(VolumeLevel::from_volume(volume).icon()).size(16);
    let volume_slider = slider(0..=MAX_VOLUME, volume, ControlMessage::VolumeChanged);

    let transport_row = Row::new()
        .spacing(10)
        .align_y(Alignment::Center)
        .push(open_btn)
        .push(prev_btn)
        .push(play_btn)
        .push(next_btn);

    let volume_row = row![volume_icon, volume_slider]
        .spacing(10)
        .align_y(Alignment::Center)
        .width(Length::Fixed(180.0));

    let top_row = Row::new()
        .spacing(20)
        .align_y(Alignment::Center)
        .push(transport_row)
        .push(volume_row);

    let progress_row = row![elapsed, progress, remaining]
        .spacing(10)
        .align_y(Alignment::Center);

    container(Column::new().spacing(8).push(top_row).push(progress_row))
        .padding(10)
        .into()
}
