use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the player's decoding, output and preference layers.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open {path}: {source}")]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to probe format: {0}")]
    Probe(symphonia::core::errors::Error),

    #[error("No playable audio track found")]
    NoAudioTrack,

    #[error("Decode error: {0}")]
    Decode(symphonia::core::errors::Error),

    #[error("No audio output device found")]
    NoOutputDevice,

    #[error("Failed to get output config: {0}")]
    OutputConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("Unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("Failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Failed to start stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("FFT size {0} is not a power of two between 32 and 32768")]
    InvalidFftSize(usize),

    #[error("Failed to parse preferences: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to write preferences: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("No configuration directory available")]
    NoConfigDir,
}

pub type Result<T> = std::result::Result<T, PlayerError>;
