//! Single dispatch point between the outside world, the audio engine and
//! the analysis views.
//!
//! Every input is a [`CoreEvent`]; anything that must happen off the UI
//! thread comes back out as an [`Effect`] for the shell to run. Engine
//! commands are sent directly over the engine's channel.

use std::path::PathBuf;
use std::sync::Arc;

use crate::analysis::loudness::LoudnessReading;
use crate::analysis::spectrum::SpectrumAnalyser;
use crate::audio::engine::EngineHandle;
use crate::audio::types::{AudioCommand, AudioData, AudioEvent};
use crate::config::{Preferences, PreferencesPatch, MAX_VOLUME};
use crate::media::{parent_folder, MediaKind, Playlist};
use crate::session::{PlayerSession, PlayerState, RESET_READOUT};
use crate::ui::meter::Channel;

/// Keyboard seek step in seconds.
pub const SEEK_STEP: f64 = 5.0;
/// Keyboard volume step, in percent.
pub const VOLUME_STEP: u8 = 5;

#[derive(Debug, Clone)]
pub enum CoreEvent {
    EngineReady(Result<EngineHandle, String>),
    FileOpened(PathBuf),
    PreferencesLoaded(PreferencesPatch),
    PlaylistReady(Playlist),
    MediaDecoded {
        path: PathBuf,
        result: Result<Arc<AudioData>, String>,
    },
    /// Display refresh.
    Tick,
    /// Drain playback events from the engine.
    Poll,
    PlayPause,
    Previous,
    Next,
    /// Seek to a fraction of the media length.
    SeekTo(f64),
    /// Seek relative to the current position, in seconds.
    SeekBy(f64),
    SetVolume(u8),
    /// Persist changed preferences and apply them once stored.
    SavePreferences(PreferencesPatch),
    Teardown,
}

/// Work the shell must perform on the coordinator's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Decode(PathBuf),
    ScanPlaylist(PathBuf),
    SavePreferences { patch: PreferencesPatch, reload: bool },
}

pub struct Coordinator {
    pub session: PlayerSession,
    engine: Option<EngineHandle>,
    ready: bool,
    pending_file: Option<PathBuf>,
    analyser: SpectrumAnalyser,
    bins: Vec<u8>,
    graph_connected: bool,
    animating: bool,
}

impl Coordinator {
    pub fn new(preferences: Preferences) -> Self {
        let analyser =
            SpectrumAnalyser::new(preferences.visualiser_fft_size).unwrap_or_default();
        let bins = vec![0; analyser.frequency_bin_count()];

        Self {
            session: PlayerSession::new(preferences),
            engine: None,
            ready: false,
            pending_file: None,
            analyser,
            bins,
            graph_connected: false,
            animating: false,
        }
    }

    /// Latest frequency-bin snapshot.
    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    /// Whether the per-frame tick should be scheduled.
    pub fn is_animating(&self) -> bool {
        self.animating
    }

    pub fn is_graph_connected(&self) -> bool {
        self.graph_connected
    }

    pub fn dispatch(&mut self, event: CoreEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            CoreEvent::EngineReady(result) => self.on_engine_ready(result, &mut effects),
            CoreEvent::FileOpened(path) => self.open_file(path, &mut effects),
            CoreEvent::PreferencesLoaded(patch) => self.apply_preferences(patch),
            CoreEvent::PlaylistReady(playlist) => self.accept_playlist(playlist),
            CoreEvent::MediaDecoded { path, result } => self.media_decoded(path, result),
            CoreEvent::Tick => self.tick(),
            CoreEvent::Poll => self.poll_engine(),
            CoreEvent::PlayPause => self.toggle_play_pause(),
            CoreEvent::Previous => {
                match self.session.playlist.previous() {
                    Some(path) => self.load_media(path, &mut effects),
                    None => tracing::debug!("Already at the first playlist entry"),
                }
            }
            CoreEvent::Next => match self.session.playlist.next() {
                Some(path) => self.load_media(path, &mut effects),
                None => tracing::debug!("Already at the last playlist entry"),
            },
            CoreEvent::SeekTo(fraction) => {
                if let Some(duration) = self.known_duration() {
                    self.seek(fraction.clamp(0.0, 1.0) * duration);
                }
            }
            CoreEvent::SeekBy(delta) => {
                if let Some(duration) = self.known_duration() {
                    self.seek((self.session.position + delta).clamp(0.0, duration));
                }
            }
            CoreEvent::SetVolume(volume) => self.set_volume(volume, &mut effects),
            CoreEvent::SavePreferences(patch) => effects.push(Effect::SavePreferences {
                patch,
                reload: true,
            }),
            CoreEvent::Teardown => self.teardown(),
        }
        effects
    }

    fn on_engine_ready(&mut self, result: Result<EngineHandle, String>, effects: &mut Vec<Effect>) {
        match result {
            Ok(engine) => {
                tracing::debug!("Engine ready at {} Hz", engine.sample_rate);
                engine.send(AudioCommand::SetVolume(self.volume_gain()));
                self.engine = Some(engine);
            }
            Err(e) => {
                tracing::error!("Audio engine unavailable: {e}");
                self.session.error = Some(format!("Audio engine error: {e}"));
            }
        }
        self.ready = true;

        if let Some(path) = self.pending_file.take() {
            tracing::debug!("Replaying file opened before startup: {}", path.display());
            self.open_file(path, effects);
        }
    }

    fn open_file(&mut self, path: PathBuf, effects: &mut Vec<Effect>) {
        if MediaKind::from_path(&path).is_none() {
            tracing::debug!("Ignoring unsupported file {}", path.display());
            return;
        }
        if !self.ready {
            self.pending_file = Some(path);
            return;
        }

        tracing::info!("Opening {}", path.display());
        let folder = parent_folder(&path);
        if folder != self.session.playlist.folder {
            self.session.playlist = Playlist::new(folder, Vec::new(), None);
            effects.push(Effect::ScanPlaylist(path.clone()));
        } else {
            self.session.playlist.select(&path);
        }

        self.load_media(path, effects);
    }

    fn accept_playlist(&mut self, playlist: Playlist) {
        if playlist.folder != self.session.playlist.folder {
            tracing::debug!("Discarding playlist for {}", playlist.folder.display());
            return;
        }
        tracing::info!(
            "Playlist rebuilt: {} entries in {}",
            playlist.len(),
            playlist.folder.display()
        );
        self.session.playlist = playlist;
    }

    fn load_media(&mut self, path: PathBuf, effects: &mut Vec<Effect>) {
        let Some(kind) = MediaKind::from_path(&path) else {
            return;
        };

        self.teardown_graph();
        self.send(AudioCommand::Unload);
        self.discard_engine_events();

        let session = &mut self.session;
        let (active, inactive) = match kind {
            MediaKind::Audio => (&mut session.audio, &mut session.video),
            MediaKind::Video => (&mut session.video, &mut session.audio),
        };
        inactive.visible = false;
        inactive.src = None;
        active.visible = true;
        active.src = Some(path.clone());

        session.target = Some(kind);
        session.state = PlayerState::Loading;
        session.position = 0.0;
        session.duration = None;
        session.error = None;
        session.reading = LoudnessReading::SILENT;
        session.readout = RESET_READOUT.to_string();

        if kind == MediaKind::Audio {
            self.build_graph();
        }

        effects.push(Effect::Decode(path));
    }

    fn media_decoded(&mut self, path: PathBuf, result: Result<Arc<AudioData>, String>) {
        if self.session.current_path() != Some(path.as_path()) {
            tracing::debug!("Dropping stale decode of {}", path.display());
            return;
        }

        match result {
            Ok(data) => {
                tracing::info!(
                    "Ready: {} ({:.1}s, {} Hz)",
                    path.display(),
                    data.duration,
                    data.sample_rate
                );
                self.session.duration = Some(data.duration);
                self.discard_engine_events();
                self.send(AudioCommand::LoadAudio(data));
                self.send(AudioCommand::Play);
                self.session.state = PlayerState::Playing;
            }
            Err(e) => {
                tracing::error!("Failed to load {}: {e}", path.display());
                self.session.error = Some(e);
                self.session.state = PlayerState::Idle;
            }
        }
    }

    /// Wire source to monitor and analyser using the current FFT size.
    fn build_graph(&mut self) {
        self.teardown_graph();

        let fft_size = self.session.preferences.visualiser_fft_size;
        if let Err(e) = self.analyser.set_fft_size(fft_size) {
            tracing::warn!("Keeping FFT size {}: {e}", self.analyser.fft_size());
        }
        self.analyser.reset();
        self.bins = vec![0; self.analyser.frequency_bin_count()];

        if let Some(engine) = &self.engine {
            for _ in engine.taps.try_iter() {}
            engine.send(AudioCommand::ConnectTaps);
        }

        self.graph_connected = true;
        self.animating = true;
        self.session.meters.show(Channel::Left, f64::NEG_INFINITY);
        self.session.meters.show(Channel::Right, f64::NEG_INFINITY);
        tracing::debug!("Analysis graph connected, FFT size {}", self.analyser.fft_size());
    }

    /// Stop the tick and unhook the taps. Safe to repeat.
    fn teardown_graph(&mut self) {
        self.animating = false;
        self.send(AudioCommand::DisconnectTaps);
        if self.graph_connected {
            tracing::debug!("Analysis graph disconnected");
        }
        self.graph_connected = false;
        self.session.meters.reset();
    }

    fn teardown(&mut self) {
        self.teardown_graph();
        self.send(AudioCommand::Unload);
        let session = &mut self.session;
        session.audio = Default::default();
        session.video = Default::default();
        session.target = None;
        session.state = PlayerState::Idle;
        session.position = 0.0;
        session.duration = None;
        session.reading = LoudnessReading::SILENT;
        session.readout = RESET_READOUT.to_string();
    }

    fn tick(&mut self) {
        if !self.animating {
            return;
        }
        if self.session.preferences.eq_stays_paused && self.session.is_paused() {
            return;
        }

        if let Some(engine) = &self.engine {
            for frame in engine.taps.try_iter() {
                self.analyser.push_samples(&frame.mono);
                self.session.reading = frame.reading;
            }
        }

        self.analyser.byte_frequency_data(&mut self.bins);

        let reading = self.session.reading;
        self.session.meters.show(Channel::Left, reading.rms_left_db);
        self.session.meters.show(Channel::Right, reading.rms_right_db);
        self.session.readout = self.session.loudness_readout();
    }

    fn poll_engine(&mut self) {
        let Some(engine) = &self.engine else {
            return;
        };
        let events: Vec<AudioEvent> = engine.events.try_iter().collect();

        for event in events {
            match event {
                AudioEvent::PositionChanged(pos) => self.session.position = pos,
                AudioEvent::PlaybackFinished => {
                    if let Some(duration) = self.session.duration {
                        self.session.position = duration;
                    }
                    self.session.state = PlayerState::Paused;
                }
                AudioEvent::Error(e) => self.session.error = Some(e),
            }
        }
    }

    /// Drop position and end-of-media events left over from the previous source.
    fn discard_engine_events(&self) {
        if let Some(engine) = &self.engine {
            for _ in engine.events.try_iter() {}
        }
    }

    fn toggle_play_pause(&mut self) {
        match self.session.state {
            PlayerState::Playing => {
                self.send(AudioCommand::Pause);
                self.session.state = PlayerState::Paused;
            }
            PlayerState::Paused => {
                self.send(AudioCommand::Play);
                self.session.state = PlayerState::Playing;
            }
            PlayerState::Idle | PlayerState::Loading => {}
        }
    }

    fn seek(&mut self, time: f64) {
        self.send(AudioCommand::Seek(time));
        self.session.position = time;
    }

    fn set_volume(&mut self, volume: u8, effects: &mut Vec<Effect>) {
        let volume = volume.min(MAX_VOLUME);
        self.session.preferences.volume = volume;
        self.send(AudioCommand::SetVolume(self.volume_gain()));
        effects.push(Effect::SavePreferences {
            patch: PreferencesPatch::volume(volume),
            reload: false,
        });
    }

    fn apply_preferences(&mut self, patch: PreferencesPatch) {
        tracing::info!("Loading preferences: {patch:?}");
        self.session.preferences.apply(&patch);
        self.send(AudioCommand::SetVolume(self.volume_gain()));

        // A live graph picks up the new FFT size by being rebuilt.
        if self.graph_connected {
            self.build_graph();
        }
    }

    fn known_duration(&self) -> Option<f64> {
        self.session.duration.filter(|d| d.is_finite() && *d > 0.0)
    }

    fn volume_gain(&self) -> f32 {
        self.session.preferences.volume as f32 / MAX_VOLUME as f32
    }

    fn send(&self, cmd: AudioCommand) {
        if let Some(engine) = &self.engine {
            engine.send(cmd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use crate::analysis::loudness::BLOCK_SIZE;
    use crate::audio::types::TapFrame;
    use crossbeam_channel::{Receiver, Sender};

    struct Harness {
        coordinator: Coordinator,
        commands: Receiver<AudioCommand>,
        taps: Sender<TapFrame>,
        events: Sender<AudioEvent>,
    }

    impl Harness {
        fn new(preferences: Preferences) -> Self {
            let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
            let (event_tx, event_rx) = crossbeam_channel::unbounded();
            let (tap_tx, tap_rx) = crossbeam_channel::unbounded();
            let mut coordinator = Coordinator::new(preferences);
            coordinator.dispatch(CoreEvent::EngineReady(Ok(EngineHandle {
                commands: cmd_tx,
                events: event_rx,
                taps: tap_rx,
                sample_rate: 48_000,
            })));
            let harness = Self {
                coordinator,
                commands: cmd_rx,
                taps: tap_tx,
                events: event_tx,
            };
            harness.drain();
            harness
        }

        fn dispatch(&mut self, event: CoreEvent) -> Vec<Effect> {
            self.coordinator.dispatch(event)
        }

        fn drain(&self) -> Vec<AudioCommand> {
            self.commands.try_iter().collect()
        }

        fn open_and_decode(&mut self, path: &str) {
            self.dispatch(CoreEvent::FileOpened(PathBuf::from(path)));
            self.dispatch(CoreEvent::MediaDecoded {
                path: PathBuf::from(path),
                result: Ok(Arc::new(AudioData {
                    samples: vec![0.0; 96_000],
                    sample_rate: 48_000,
                    channels: 2,
                    duration: 1.0,
                })),
            });
        }

        fn session(&self) -> &PlayerSession {
            &self.coordinator.session
        }
    }

    fn tap_frame(rms_left_db: f64, rms_right_db: f64) -> TapFrame {
        TapFrame {
            reading: LoudnessReading {
                lufs: -20.0,
                rms_left_db,
                rms_right_db,
            },
            mono: vec![0.25; BLOCK_SIZE],
        }
    }

    #[test]
    fn opening_audio_shows_audio_and_builds_graph() {
        let mut h = Harness::new(Preferences::default());
        let effects = h.dispatch(CoreEvent::FileOpened(PathBuf::from("/music/song.mp3")));

        assert_eq!(
            effects,
            vec![
                Effect::ScanPlaylist(PathBuf::from("/music/song.mp3")),
                Effect::Decode(PathBuf::from("/music/song.mp3")),
            ]
        );
        assert!(h.session().audio.visible);
        assert!(!h.session().video.visible);
        assert_eq!(h.session().video.src, None);
        assert_eq!(h.session().state, PlayerState::Loading);
        assert!(h.coordinator.is_graph_connected());
        assert!(h.coordinator.is_animating());

        let commands = h.drain();
        assert!(matches!(commands.last(), Some(AudioCommand::ConnectTaps)));
    }

    #[test]
    fn opening_video_hides_audio_and_disconnects_graph() {
        let mut h = Harness::new(Preferences::default());
        h.open_and_decode("/music/song.mp3");
        h.drain();

        h.dispatch(CoreEvent::FileOpened(PathBuf::from("/music/clip.mkv")));
        assert!(h.session().video.visible);
        assert!(!h.session().audio.visible);
        assert_eq!(h.session().audio.src, None);
        assert_eq!(h.session().target, Some(MediaKind::Video));
        assert!(!h.coordinator.is_graph_connected());
        assert!(!h.coordinator.is_animating());

        let commands = h.drain();
        assert!(commands
            .iter()
            .any(|c| matches!(c, AudioCommand::DisconnectTaps)));
        assert!(!commands.iter().any(|c| matches!(c, AudioCommand::ConnectTaps)));
    }

    #[test]
    fn decoded_media_starts_playing() {
        let mut h = Harness::new(Preferences::default());
        h.open_and_decode("/music/song.mp3");

        assert_eq!(h.session().state, PlayerState::Playing);
        assert_eq!(h.session().duration, Some(1.0));
        let commands = h.drain();
        let n = commands.len();
        assert!(matches!(commands[n - 2], AudioCommand::LoadAudio(_)));
        assert!(matches!(commands[n - 1], AudioCommand::Play));
    }

    #[test]
    fn stale_decode_is_ignored() {
        let mut h = Harness::new(Preferences::default());
        h.dispatch(CoreEvent::FileOpened(PathBuf::from("/music/a.mp3")));
        h.dispatch(CoreEvent::FileOpened(PathBuf::from("/music/b.mp3")));
        h.drain();

        h.dispatch(CoreEvent::MediaDecoded {
            path: PathBuf::from("/music/a.mp3"),
            result: Err("late".into()),
        });
        assert_eq!(h.session().state, PlayerState::Loading);
        assert_eq!(h.session().error, None);
        assert!(h.drain().is_empty());
    }

    #[test]
    fn decode_failure_returns_to_idle() {
        let mut h = Harness::new(Preferences::default());
        h.dispatch(CoreEvent::FileOpened(PathBuf::from("/music/a.mp3")));
        h.dispatch(CoreEvent::MediaDecoded {
            path: PathBuf::from("/music/a.mp3"),
            result: Err("bad header".into()),
        });
        assert_eq!(h.session().state, PlayerState::Idle);
        assert_eq!(h.session().error.as_deref(), Some("bad header"));
    }

    #[test]
    fn unsupported_files_are_ignored() {
        let mut h = Harness::new(Preferences::default());
        let effects = h.dispatch(CoreEvent::FileOpened(PathBuf::from("/docs/readme.txt")));
        assert!(effects.is_empty());
        assert_eq!(h.session().state, PlayerState::Idle);
        assert!(h.drain().is_empty());
    }

    #[test]
    fn file_opened_before_ready_is_replayed() {
        let mut coordinator = Coordinator::new(Preferences::default());
        let effects = coordinator.dispatch(CoreEvent::FileOpened(PathBuf::from("/m/early.wav")));
        assert!(effects.is_empty());
        assert_eq!(coordinator.session.state, PlayerState::Idle);

        let (cmd_tx, _cmd_rx) = crossbeam_channel::unbounded();
        let (_event_tx, event_rx) = crossbeam_channel::unbounded();
        let (_tap_tx, tap_rx) = crossbeam_channel::unbounded();
        let effects = coordinator.dispatch(CoreEvent::EngineReady(Ok(EngineHandle {
            commands: cmd_tx,
            events: event_rx,
            taps: tap_rx,
            sample_rate: 44_100,
        })));

        assert!(effects.contains(&Effect::Decode(PathBuf::from("/m/early.wav"))));
        assert_eq!(coordinator.session.state, PlayerState::Loading);
    }

    #[test]
    fn engine_failure_still_replays_pending_file() {
        let mut coordinator = Coordinator::new(Preferences::default());
        coordinator.dispatch(CoreEvent::FileOpened(PathBuf::from("/m/early.wav")));
        let effects = coordinator.dispatch(CoreEvent::EngineReady(Err("no device".into())));
        assert!(effects.contains(&Effect::Decode(PathBuf::from("/m/early.wav"))));
    }

    #[test]
    fn engine_failure_is_reported() {
        let mut coordinator = Coordinator::new(Preferences::default());
        coordinator.dispatch(CoreEvent::EngineReady(Err("no device".into())));
        assert_eq!(
            coordinator.session.error.as_deref(),
            Some("Audio engine error: no device")
        );
    }

    #[test]
    fn track_navigation_is_bounded() {
        let mut h = Harness::new(Preferences::default());
        h.dispatch(CoreEvent::FileOpened(PathBuf::from("/music/a.mp3")));
        h.dispatch(CoreEvent::PlaylistReady(Playlist::new(
            PathBuf::from("/music"),
            vec!["a.mp3".into(), "b.mp3".into(), "c.mp3".into()],
            Some(0),
        )));

        assert!(h.dispatch(CoreEvent::Previous).is_empty());
        assert_eq!(h.session().playlist.current, Some(0));

        let effects = h.dispatch(CoreEvent::Next);
        assert_eq!(effects, vec![Effect::Decode(PathBuf::from("/music/b.mp3"))]);
        h.dispatch(CoreEvent::Next);
        assert_eq!(h.session().playlist.current, Some(2));
        assert_eq!(h.session().current_path(), Some(Path::new("/music/c.mp3")));

        assert!(h.dispatch(CoreEvent::Next).is_empty());
        assert_eq!(h.session().playlist.current, Some(2));
    }

    #[test]
    fn same_folder_reuses_playlist() {
        let mut h = Harness::new(Preferences::default());
        h.dispatch(CoreEvent::FileOpened(PathBuf::from("/music/a.mp3")));
        h.dispatch(CoreEvent::PlaylistReady(Playlist::new(
            PathBuf::from("/music"),
            vec!["a.mp3".into(), "b.mp3".into()],
            Some(0),
        )));

        let effects = h.dispatch(CoreEvent::FileOpened(PathBuf::from("/music/b.mp3")));
        assert_eq!(effects, vec![Effect::Decode(PathBuf::from("/music/b.mp3"))]);
        assert_eq!(h.session().playlist.current, Some(1));
    }

    #[test]
    fn playlist_for_other_folder_is_discarded() {
        let mut h = Harness::new(Preferences::default());
        h.dispatch(CoreEvent::FileOpened(PathBuf::from("/music/a.mp3")));
        h.dispatch(CoreEvent::PlaylistReady(Playlist::new(
            PathBuf::from("/elsewhere"),
            vec!["x.mp3".into()],
            Some(0),
        )));
        assert!(h.session().playlist.is_empty());
    }

    #[test]
    fn fft_size_change_applies_on_next_load() {
        let mut h = Harness::new(Preferences::default());
        h.open_and_decode("/music/a.mp3");
        assert_eq!(h.coordinator.bins().len(), 512);

        h.coordinator.session.preferences.visualiser_fft_size = 2048;
        assert_eq!(h.coordinator.bins().len(), 512);

        h.open_and_decode("/music/b.mp3");
        assert_eq!(h.coordinator.bins().len(), 1024);
    }

    #[test]
    fn preferences_rebuild_live_graph() {
        let mut h = Harness::new(Preferences::default());
        h.open_and_decode("/music/a.mp3");
        h.dispatch(CoreEvent::PreferencesLoaded(PreferencesPatch {
            visualiser_fft_size: Some(2048),
            ..PreferencesPatch::default()
        }));
        assert_eq!(h.coordinator.bins().len(), 1024);
        assert!(h.coordinator.is_graph_connected());
    }

    #[test]
    fn preferences_without_graph_only_store_values() {
        let mut h = Harness::new(Preferences::default());
        h.dispatch(CoreEvent::PreferencesLoaded(PreferencesPatch {
            visualiser_fft_size: Some(4096),
            eq_stays_paused: Some(true),
            ..PreferencesPatch::default()
        }));
        assert!(!h.coordinator.is_graph_connected());
        assert_eq!(h.coordinator.bins().len(), 512);
        assert_eq!(h.session().preferences.visualiser_fft_size, 4096);
        assert!(h.session().preferences.eq_stays_paused);
    }

    #[test]
    fn tick_pulls_latest_reading_into_meters() {
        let mut h = Harness::new(Preferences::default());
        h.open_and_decode("/music/a.mp3");

        h.taps.send(tap_frame(-12.0, -18.0)).unwrap();
        h.taps.send(tap_frame(-6.0, -9.0)).unwrap();
        h.dispatch(CoreEvent::Tick);

        let meters = &h.session().meters;
        assert_eq!(meters.left, -6.0);
        assert_eq!(meters.right, -9.0);
        assert_eq!(meters.peaks.overall, -6.0);
        assert!(h.coordinator.bins()[0] > 0);
        assert_eq!(h.session().readout, "LUFS: -20.00 dB | Peak RMS: -6.00 dB");
    }

    #[test]
    fn silent_reading_resets_peaks() {
        let mut h = Harness::new(Preferences::default());
        h.open_and_decode("/music/a.mp3");

        h.taps.send(tap_frame(-6.0, -6.0)).unwrap();
        h.dispatch(CoreEvent::Tick);
        h.taps
            .send(tap_frame(f64::NEG_INFINITY, f64::NEG_INFINITY))
            .unwrap();
        h.dispatch(CoreEvent::Tick);
        assert_eq!(h.session().meters.peaks.overall, f64::NEG_INFINITY);

        h.taps.send(tap_frame(-30.0, -40.0)).unwrap();
        h.dispatch(CoreEvent::Tick);
        assert_eq!(h.session().meters.peaks.left, -30.0);
        assert_eq!(h.session().meters.peaks.overall, -30.0);
    }

    #[test]
    fn paused_visuals_freeze_when_preferred() {
        let prefs = Preferences {
            eq_stays_paused: true,
            ..Preferences::default()
        };
        let mut h = Harness::new(prefs);
        h.open_and_decode("/music/a.mp3");
        h.taps.send(tap_frame(-6.0, -6.0)).unwrap();
        h.dispatch(CoreEvent::Tick);

        h.dispatch(CoreEvent::PlayPause);
        assert_eq!(h.session().state, PlayerState::Paused);
        let frozen = h.coordinator.bins().to_vec();

        h.taps.send(tap_frame(-1.0, -1.0)).unwrap();
        h.dispatch(CoreEvent::Tick);
        assert_eq!(h.session().meters.left, -6.0);
        assert_eq!(h.coordinator.bins(), frozen.as_slice());
    }

    #[test]
    fn paused_visuals_keep_running_by_default() {
        let mut h = Harness::new(Preferences::default());
        h.open_and_decode("/music/a.mp3");
        h.dispatch(CoreEvent::PlayPause);

        h.taps.send(tap_frame(-1.0, -2.0)).unwrap();
        h.dispatch(CoreEvent::Tick);
        assert_eq!(h.session().meters.left, -1.0);
    }

    #[test]
    fn teardown_stops_ticks_and_resets_peaks() {
        let mut h = Harness::new(Preferences::default());
        h.open_and_decode("/music/a.mp3");
        h.taps.send(tap_frame(-3.0, -3.0)).unwrap();
        h.dispatch(CoreEvent::Tick);
        h.drain();

        h.dispatch(CoreEvent::Teardown);
        assert!(!h.coordinator.is_animating());
        assert_eq!(h.session().meters.peaks.overall, f64::NEG_INFINITY);
        assert_eq!(h.session().state, PlayerState::Idle);
        let commands = h.drain();
        assert!(matches!(commands[0], AudioCommand::DisconnectTaps));

        // Tearing down again is harmless.
        h.dispatch(CoreEvent::Teardown);
        h.dispatch(CoreEvent::Tick);
        assert_eq!(h.session().meters.left, f64::NEG_INFINITY);
    }

    #[test]
    fn seeking_needs_known_duration() {
        let mut h = Harness::new(Preferences::default());
        h.dispatch(CoreEvent::FileOpened(PathBuf::from("/music/a.mp3")));
        h.drain();
        h.dispatch(CoreEvent::SeekTo(0.5));
        assert!(h.drain().is_empty());

        h.dispatch(CoreEvent::MediaDecoded {
            path: PathBuf::from("/music/a.mp3"),
            result: Ok(Arc::new(AudioData {
                samples: vec![0.0; 20],
                sample_rate: 1,
                channels: 2,
                duration: 10.0,
            })),
        });
        h.drain();

        h.dispatch(CoreEvent::SeekTo(0.5));
        assert_eq!(h.session().position, 5.0);
        h.dispatch(CoreEvent::SeekBy(SEEK_STEP * 2.0));
        assert_eq!(h.session().position, 10.0);
        h.dispatch(CoreEvent::SeekBy(-SEEK_STEP * 3.0));
        assert_eq!(h.session().position, 0.0);
    }

    #[test]
    fn volume_changes_are_saved_without_reload() {
        let mut h = Harness::new(Preferences::default());
        let effects = h.dispatch(CoreEvent::SetVolume(40));
        assert_eq!(
            effects,
            vec![Effect::SavePreferences {
                patch: PreferencesPatch::volume(40),
                reload: false,
            }]
        );
        let commands = h.drain();
        assert!(matches!(
            commands.as_slice(),
            [AudioCommand::SetVolume(v)] if (v - 0.4).abs() < 1e-6
        ));
    }

    #[test]
    fn bare_file_name_scans_working_directory() {
        let mut h = Harness::new(Preferences::default());
        let effects = h.dispatch(CoreEvent::FileOpened(PathBuf::from("song.mp3")));
        assert_eq!(
            effects,
            vec![
                Effect::ScanPlaylist(PathBuf::from("song.mp3")),
                Effect::Decode(PathBuf::from("song.mp3")),
            ]
        );
        assert_eq!(h.session().playlist.folder, PathBuf::from("."));

        h.dispatch(CoreEvent::PlaylistReady(Playlist::new(
            PathBuf::from("."),
            vec!["other.mp3".into(), "song.mp3".into()],
            Some(1),
        )));
        assert_eq!(h.session().playlist.len(), 2);
        let effects = h.dispatch(CoreEvent::Previous);
        assert_eq!(effects, vec![Effect::Decode(PathBuf::from("./other.mp3"))]);
    }

    #[test]
    fn saved_preferences_are_reloaded() {
        let mut h = Harness::new(Preferences::default());
        let patch = PreferencesPatch {
            visualiser_fft_size: Some(2048),
            eq_stays_paused: Some(true),
            ..PreferencesPatch::default()
        };
        let effects = h.dispatch(CoreEvent::SavePreferences(patch.clone()));
        assert_eq!(
            effects,
            vec![Effect::SavePreferences {
                patch: patch.clone(),
                reload: true,
            }]
        );
        // Nothing changes until the stored result comes back.
        assert_eq!(h.session().preferences.visualiser_fft_size, 1024);

        h.dispatch(CoreEvent::PreferencesLoaded(patch));
        assert!(h.session().preferences.eq_stays_paused);
        assert_eq!(h.coordinator.bins().len(), 512);

        h.open_and_decode("/music/a.mp3");
        assert_eq!(h.coordinator.bins().len(), 1024);
    }

    #[test]
    fn previous_track_events_do_not_leak_into_next_load() {
        let mut h = Harness::new(Preferences::default());
        h.open_and_decode("/music/a.mp3");

        // The old track ended but the poll has not run yet.
        h.events.send(AudioEvent::PositionChanged(1.0)).unwrap();
        h.events.send(AudioEvent::PlaybackFinished).unwrap();
        h.open_and_decode("/music/b.mp3");
        h.dispatch(CoreEvent::Poll);

        assert_eq!(h.session().state, PlayerState::Playing);
        assert_eq!(h.session().position, 0.0);
    }

    #[test]
    fn engine_events_update_position_and_state() {
        let mut h = Harness::new(Preferences::default());
        h.open_and_decode("/music/a.mp3");

        h.events.send(AudioEvent::PositionChanged(0.4)).unwrap();
        h.dispatch(CoreEvent::Poll);
        assert_eq!(h.session().position, 0.4);

        h.events.send(AudioEvent::PlaybackFinished).unwrap();
        h.dispatch(CoreEvent::Poll);
        assert_eq!(h.session().state, PlayerState::Paused);
        assert_eq!(h.session().position, 1.0);

        h.dispatch(CoreEvent::PlayPause);
        assert_eq!(h.session().state, PlayerState::Playing);
    }
}
