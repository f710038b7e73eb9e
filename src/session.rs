//! Owned player state: what is loaded, where playback is, what the meters show.

use std::path::{Path, PathBuf};

use crate::analysis::loudness::{LoudnessReading, LOUDNESS_FLOOR_DB};
use crate::config::Preferences;
use crate::media::{MediaKind, Playlist};
use crate::ui::meter::Meters;

pub const RESET_READOUT: &str = "LUFS: -∞ dB | RMS: -∞ dB";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Nothing loaded.
    Idle,
    /// Source set, decode in flight.
    Loading,
    Playing,
    Paused,
}

/// One of the two output surfaces a file can play through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaElement {
    pub src: Option<PathBuf>,
    pub visible: bool,
}

#[derive(Debug)]
pub struct PlayerSession {
    pub state: PlayerState,
    pub preferences: Preferences,
    pub playlist: Playlist,
    pub audio: MediaElement,
    pub video: MediaElement,
    pub target: Option<MediaKind>,
    /// Seconds into the active media.
    pub position: f64,
    /// Seconds; `None` until the media is decoded.
    pub duration: Option<f64>,
    pub reading: LoudnessReading,
    pub meters: Meters,
    pub readout: String,
    pub error: Option<String>,
}

impl PlayerSession {
    pub fn new(preferences: Preferences) -> Self {
        Self {
            state: PlayerState::Idle,
            preferences,
            playlist: Playlist::default(),
            audio: MediaElement::default(),
            video: MediaElement::default(),
            target: None,
            position: 0.0,
            duration: None,
            reading: LoudnessReading::SILENT,
            meters: Meters::new(),
            readout: RESET_READOUT.to_string(),
            error: None,
        }
    }

    pub fn active_element(&self) -> Option<&MediaElement> {
        match self.target? {
            MediaKind::Audio => Some(&self.audio),
            MediaKind::Video => Some(&self.video),
        }
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.active_element()?.src.as_deref()
    }

    /// A media element reports paused unless it is actually playing.
    pub fn is_paused(&self) -> bool {
        self.state != PlayerState::Playing
    }

    /// File name without extension.
    pub fn title(&self) -> Option<String> {
        self.current_path()?
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
    }

    pub fn now_playing(&self) -> Option<String> {
        let name = self.current_path()?.file_name()?.to_string_lossy().into_owned();
        Some(format!("Now playing: {name}"))
    }

    /// Fraction of the media played, 0 when the length is unknown.
    pub fn progress(&self) -> f32 {
        match self.duration {
            Some(d) if d > 0.0 && d.is_finite() => (self.position / d).clamp(0.0, 1.0) as f32,
            _ => 0.0,
        }
    }

    /// Seconds left; NaN when the length is unknown.
    pub fn remaining(&self) -> f64 {
        self.duration.unwrap_or(f64::NAN) - self.position
    }

    pub fn elapsed(&self) -> f64 {
        match self.duration {
            Some(_) => self.position,
            None => f64::NAN,
        }
    }

    /// The loudness line under the meters.
    pub fn loudness_readout(&self) -> String {
        let muted = self.preferences.volume == 0;
        let lufs = if self.reading.lufs == LOUDNESS_FLOOR_DB || self.is_paused() || muted {
            "-∞".to_string()
        } else {
            format!("{:.2}", self.reading.lufs)
        };
        let overall = self.meters.peaks.overall;
        let peak = if overall == f64::NEG_INFINITY {
            "-∞".to_string()
        } else {
            format!("{overall:.2}")
        };
        format!("LUFS: {lufs} dB | Peak RMS: {peak} dB")
    }
}
