use std::sync::Arc;

use crate::analysis::loudness::LoudnessReading;

/// Decoded audio data stored entirely in memory.
#[derive(Clone, Debug)]
pub struct AudioData {
    /// Interleaved samples normalized to [-1.0, 1.0].
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Duration in seconds.
    pub duration: f64,
}

impl AudioData {
    /// Total number of frames (samples per channel).
    pub fn num_frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Left/right pair for a frame; mono sources feed both sides.
    pub fn stereo_frame(&self, frame: usize) -> (f32, f32) {
        let ch = self.channels as usize;
        let base = frame * ch;
        match self.samples.get(base..base + ch) {
            Some([only]) => (*only, *only),
            Some([l, r, ..]) => (*l, *r),
            _ => (0.0, 0.0),
        }
    }
}

/// Commands sent from the UI thread to the audio thread.
#[derive(Debug, Clone)]
pub enum AudioCommand {
    /// Swap the source's media; the output stream itself is reused.
    LoadAudio(Arc<AudioData>),
    Unload,
    Play,
    Pause,
    Seek(f64),
    SetVolume(f32),
    /// Route output through the loudness monitor and analyser tap.
    ConnectTaps,
    DisconnectTaps,
}

/// Events sent from the audio thread to the UI thread.
#[derive(Debug, Clone)]
pub enum AudioEvent {
    PositionChanged(f64),
    PlaybackFinished,
    Error(String),
}

/// One processed block's worth of analysis output.
#[derive(Debug, Clone)]
pub struct TapFrame {
    pub reading: LoudnessReading,
    /// Mono downmix of the block, for the spectrum analyser.
    pub mono: Vec<f32>,
}
