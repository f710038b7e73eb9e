use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use super::taps::AnalysisTaps;
use super::types::{AudioCommand, AudioData, AudioEvent, TapFrame};
use crate::error::{PlayerError, Result};

/// How often (in output frames) to send position updates.
const POSITION_UPDATE_INTERVAL: usize = 2048;
/// Tap frames buffered for the UI before new ones are dropped.
const TAP_CHANNEL_CAPACITY: usize = 16;

/// UI-side handle to the running output engine.
///
/// The engine plays the role of the audio context: it is created once and
/// every file load only swaps the media it reads from.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    pub commands: Sender<AudioCommand>,
    pub events: Receiver<AudioEvent>,
    pub taps: Receiver<TapFrame>,
    pub sample_rate: u32,
}

impl EngineHandle {
    /// Send a command; a dead engine has nothing left to control.
    pub fn send(&self, cmd: AudioCommand) {
        if self.commands.send(cmd).is_err() {
            tracing::debug!("Audio engine is gone, command dropped");
        }
    }
}

struct EngineState {
    audio: Option<Arc<AudioData>>,
    /// Fractional read position in source frames.
    position: f64,
    playing: bool,
    volume: f32,
    output_sample_rate: u32,
    frames_since_update: usize,
    taps: AnalysisTaps,
}

impl EngineState {
    fn new(output_sample_rate: u32, taps: AnalysisTaps) -> Self {
        Self {
            audio: None,
            position: 0.0,
            playing: false,
            volume: 1.0,
            output_sample_rate,
            frames_since_update: 0,
            taps,
        }
    }

    fn handle_command(&mut self, cmd: AudioCommand, event_tx: &Sender<AudioEvent>) {
        match cmd {
            AudioCommand::LoadAudio(data) => {
                self.audio = Some(data);
                self.position = 0.0;
                self.playing = false;
                let _ = event_tx.try_send(AudioEvent::PositionChanged(0.0));
            }
            AudioCommand::Unload => {
                self.audio = None;
                self.position = 0.0;
                self.playing = false;
            }
            AudioCommand::Play => {
                if let Some(audio) = &self.audio {
                    // Playing after the end starts over.
                    if self.position >= audio.num_frames() as f64 {
                        self.position = 0.0;
                    }
                    self.playing = true;
                }
            }
            AudioCommand::Pause => {
                self.playing = false;
            }
            AudioCommand::Seek(time) => {
                if let Some(audio) = &self.audio {
                    let frame = (time.max(0.0) * audio.sample_rate as f64).floor();
                    self.position = frame.min(audio.num_frames() as f64);
                    let pos_secs = self.position / audio.sample_rate as f64;
                    let _ = event_tx.try_send(AudioEvent::PositionChanged(pos_secs));
                }
            }
            AudioCommand::SetVolume(volume) => {
                self.volume = volume.clamp(0.0, 1.0);
            }
            AudioCommand::ConnectTaps => self.taps.connect(),
            AudioCommand::DisconnectTaps => self.taps.disconnect(),
        }
    }

    /// Fill the output buffer with the current source, resampled to the
    /// device rate, then pass it through the analysis taps.
    fn fill_buffer(&mut self, output: &mut [f32], channels: u16, event_tx: &Sender<AudioEvent>) {
        let out_channels = channels as usize;
        output.fill(0.0);

        if self.playing {
            if let Some(audio) = self.audio.clone() {
                self.render(&audio, output, out_channels, event_tx);
            }
        }

        // Silence still flows through the taps, like a paused media element.
        self.taps.feed(output, out_channels);
    }

    fn render(
        &mut self,
        audio: &AudioData,
        output: &mut [f32],
        out_channels: usize,
        event_tx: &Sender<AudioEvent>,
    ) {
        if out_channels == 0 {
            return;
        }
        let total_frames = audio.num_frames();
        let step = audio.sample_rate as f64 / self.output_sample_rate as f64;

        for frame in output.chunks_exact_mut(out_channels) {
            if self.position >= total_frames as f64 {
                self.playing = false;
                let _ = event_tx.try_send(AudioEvent::PlaybackFinished);
                return;
            }

            let index = self.position as usize;
            let frac = (self.position - index as f64) as f32;
            let (l0, r0) = audio.stereo_frame(index);
            let (l1, r1) = if index + 1 < total_frames {
                audio.stereo_frame(index + 1)
            } else {
                (l0, r0)
            };
            let left = (l0 + (l1 - l0) * frac) * self.volume;
            let right = (r0 + (r1 - r0) * frac) * self.volume;

            match frame {
                [only] => *only = 0.5 * (left + right),
                [l, r, rest @ ..] => {
                    *l = left;
                    *r = right;
                    rest.fill(0.0);
                }
                [] => {}
            }

            self.position += step;
            self.frames_since_update += 1;
            if self.frames_since_update >= POSITION_UPDATE_INTERVAL {
                self.frames_since_update = 0;
                let pos_secs = self.position / audio.sample_rate as f64;
                let _ = event_tx.try_send(AudioEvent::PositionChanged(pos_secs));
            }
        }
    }
}

/// Open the default output device and start the engine thread.
pub fn spawn_engine() -> Result<EngineHandle> {
    let (cmd_tx, cmd_rx) = crossbeam_channel::bounded::<AudioCommand>(64);
    let (event_tx, event_rx) = crossbeam_channel::bounded::<AudioEvent>(256);
    let (tap_tx, tap_rx) = crossbeam_channel::bounded::<TapFrame>(TAP_CHANNEL_CAPACITY);

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(PlayerError::NoOutputDevice)?;

    let config = device.default_output_config()?;

    let sample_rate = config.sample_rate();
    let channels = config.channels();
    let sample_format = config.sample_format();

    let taps = AnalysisTaps::new(sample_rate, tap_tx);
    let mut state = EngineState::new(sample_rate, taps);
    let event_tx_clone = event_tx.clone();

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                while let Ok(cmd) = cmd_rx.try_recv() {
                    state.handle_command(cmd, &event_tx_clone);
                }
                state.fill_buffer(data, channels, &event_tx_clone);
            },
            move |err| {
                tracing::error!("Audio stream error: {err}");
                let _ = event_tx.try_send(AudioEvent::Error(err.to_string()));
            },
            None,
        )?,
        other => return Err(PlayerError::UnsupportedSampleFormat(format!("{other:?}"))),
    };

    stream.play()?;

    tracing::info!("Audio output running at {sample_rate} Hz, {channels} channels");

    // Keep stream alive by moving it into a thread
    std::thread::Builder::new()
        .name("audio-keepalive".into())
        .spawn(move || {
            let _stream = stream;
            loop {
                std::thread::park();
            }
        })?;

    Ok(EngineHandle {
        commands: cmd_tx,
        events: event_rx,
        taps: tap_rx,
        sample_rate,
    })
}
