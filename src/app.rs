use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use iced::keyboard;
use iced::widget::{button, canvas, center, column, container, pick_list, row, text, toggler};
use iced::{window, Alignment, Color, Element, Length, Subscription, Task, Theme};

use crate::analysis::spectrum::FFT_SIZE_CHOICES;
use crate::audio::decoder;
use crate::audio::engine;
use crate::config::{PreferenceStore, Preferences, PreferencesPatch, MAX_VOLUME};
use crate::coordinator::{CoreEvent, Coordinator, Effect, SEEK_STEP, VOLUME_STEP};
use crate::media::{MediaKind, Playlist, AUDIO_EXTENSIONS, VIDEO_EXTENSIONS};
use crate::ui::controls::{self, ControlMessage};
use crate::ui::meter::Channel;
use crate::ui::spectrum::SpectrumView;

const VISUALS_HEIGHT: f32 = 220.0;
const METER_WIDTH: f32 = 36.0;
const APP_NAME: &str = "Diamond Player";

pub struct App {
    core: Coordinator,
    store: Option<PreferenceStore>,
    show_preferences: bool,
    fullscreen: bool,
}

#[derive(Debug, Clone)]
pub enum Message {
    Core(CoreEvent),
    Control(ControlMessage),
    KeyEvent(keyboard::Event),
    FileDialogResult(Option<PathBuf>),
    PreferencesRead(Result<PreferencesPatch, String>),
    PreferencesSaved {
        result: Result<PreferencesPatch, String>,
        reload: bool,
    },
    TogglePreferences,
    FftSizeSelected(usize),
    EqStaysPausedToggled(bool),
    CloseRequested,
}

fn boot() -> (App, Task<Message>) {
    let store = match PreferenceStore::default_location() {
        Ok(store) => {
            tracing::debug!("Preferences file: {}", store.path().display());
            Some(store)
        }
        Err(e) => {
            tracing::warn!("Preferences will not be persisted: {e}");
            None
        }
    };

    let app = App {
        core: Coordinator::new(Preferences::default()),
        store: store.clone(),
        show_preferences: false,
        fullscreen: false,
    };

    let engine_task = Task::perform(
        async {
            tokio::task::spawn_blocking(|| engine::spawn_engine().map_err(|e| e.to_string()))
                .await
                .unwrap_or_else(|e| Err(e.to_string()))
        },
        |result| Message::Core(CoreEvent::EngineReady(result)),
    );

    let prefs_task = match store {
        Some(store) => Task::perform(
            async move {
                tokio::task::spawn_blocking(move || store.load().map_err(|e| e.to_string()))
                    .await
                    .unwrap_or_else(|e| Err(e.to_string()))
            },
            Message::PreferencesRead,
        ),
        None => Task::none(),
    };

    // A path on the command line opens like a dialog pick; the coordinator
    // holds it until the engine is up.
    let cli_task = match std::env::args_os().nth(1) {
        Some(arg) => Task::done(Message::Core(CoreEvent::FileOpened(PathBuf::from(arg)))),
        None => Task::none(),
    };

    (app, Task::batch([engine_task, prefs_task, cli_task]))
}

fn title(app: &App) -> String {
    match app.core.session.title() {
        Some(stem) => format!("{APP_NAME} - {stem}"),
        None => APP_NAME.to_string(),
    }
}

fn dispatch(app: &mut App, event: CoreEvent) -> Task<Message> {
    let effects = app.core.dispatch(event);
    Task::batch(
        effects
            .into_iter()
            .map(|effect| effect_task(app.store.clone(), effect)),
    )
}

fn effect_task(store: Option<PreferenceStore>, effect: Effect) -> Task<Message> {
    match effect {
        Effect::Decode(path) => {
            let source = path.clone();
            Task::perform(
                async move {
                    tokio::task::spawn_blocking(move || {
                        decoder::decode_file(&source)
                            .map(Arc::new)
                            .map_err(|e| e.to_string())
                    })
                    .await
                    .unwrap_or_else(|e| Err(e.to_string()))
                },
                move |result| {
                    Message::Core(CoreEvent::MediaDecoded {
                        path: path.clone(),
                        result,
                    })
                },
            )
        }
        Effect::ScanPlaylist(selected) => Task::perform(
            async move {
                tokio::task::spawn_blocking(move || Playlist::scan(&selected))
                    .await
                    .unwrap_or_else(|e| {
                        tracing::error!("Playlist scan failed: {e}");
                        Playlist::default()
                    })
            },
            |playlist| Message::Core(CoreEvent::PlaylistReady(playlist)),
        ),
        Effect::SavePreferences { patch, reload } => {
            // Without a file the change still applies for this session.
            let Some(store) = store else {
                return Task::done(Message::PreferencesSaved {
                    result: Ok(patch),
                    reload,
                });
            };
            Task::perform(
                async move {
                    tokio::task::spawn_blocking(move || store.save(patch).map_err(|e| e.to_string()))
                        .await
                        .unwrap_or_else(|e| Err(e.to_string()))
                },
                move |result| Message::PreferencesSaved { result, reload },
            )
        }
    }
}

fn open_dialog(start_dir: Option<PathBuf>) -> Task<Message> {
    Task::perform(
        async move {
            let all: Vec<&str> = AUDIO_EXTENSIONS
                .iter()
                .chain(VIDEO_EXTENSIONS)
                .copied()
                .collect();
            let mut dialog = rfd::AsyncFileDialog::new()
                .add_filter("Media", all.as_slice())
                .add_filter("Audio", AUDIO_EXTENSIONS)
                .add_filter("Video", VIDEO_EXTENSIONS);
            if let Some(dir) = start_dir {
                dialog = dialog.set_directory(dir);
            }
            let handle = dialog.pick_file().await;
            handle.map(|h| h.path().to_path_buf())
        },
        Message::FileDialogResult,
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Shortcut {
    OpenFile,
    ToggleFullscreen,
    PlayPause,
    SeekBy(f64),
    VolumeUp,
    VolumeDown,
}

fn shortcut(key: keyboard::Key<&str>, modifiers: keyboard::Modifiers) -> Option<Shortcut> {
    use keyboard::key::Named;

    match key {
        keyboard::Key::Character("o" | "O") if modifiers.command() => Some(Shortcut::OpenFile),
        keyboard::Key::Named(Named::F11) => Some(Shortcut::ToggleFullscreen),
        keyboard::Key::Named(Named::Space) => Some(Shortcut::PlayPause),
        keyboard::Key::Named(Named::ArrowLeft) => Some(Shortcut::SeekBy(-SEEK_STEP)),
        keyboard::Key::Named(Named::ArrowRight) => Some(Shortcut::SeekBy(SEEK_STEP)),
        keyboard::Key::Named(Named::ArrowUp) => Some(Shortcut::VolumeUp),
        keyboard::Key::Named(Named::ArrowDown) => Some(Shortcut::VolumeDown),
        _ => None,
    }
}

/// Last opened directory, else the user's music folder.
fn dialog_start_dir(app: &App) -> Option<PathBuf> {
    app.core
        .session
        .preferences
        .last_opened_directory
        .clone()
        .or_else(dirs::audio_dir)
}

fn toggle_fullscreen(app: &mut App) -> Task<Message> {
    app.fullscreen = !app.fullscreen;
    let mode = if app.fullscreen {
        window::Mode::Fullscreen
    } else {
        window::Mode::Windowed
    };
    window::latest().and_then(move |id| window::set_mode(id, mode))
}

fn update(app: &mut App, message: Message) -> Task<Message> {
    match message {
        Message::Core(event) => dispatch(app, event),
        Message::Control(ctrl) => match ctrl {
            ControlMessage::OpenFile => open_dialog(dialog_start_dir(app)),
            ControlMessage::PlayPause => dispatch(app, CoreEvent::PlayPause),
            ControlMessage::Previous => dispatch(app, CoreEvent::Previous),
            ControlMessage::Next => dispatch(app, CoreEvent::Next),
            ControlMessage::Seek(fraction) => dispatch(app, CoreEvent::SeekTo(fraction as f64)),
            ControlMessage::VolumeChanged(volume) => dispatch(app, CoreEvent::SetVolume(volume)),
        },
        Message::FileDialogResult(path) => {
            let Some(path) = path else {
                return Task::none();
            };
            let remember = match path.parent() {
                Some(dir) => {
                    let dir = dir.to_path_buf();
                    app.core.session.preferences.last_opened_directory = Some(dir.clone());
                    effect_task(
                        app.store.clone(),
                        Effect::SavePreferences {
                            patch: PreferencesPatch::last_opened_directory(dir),
                            reload: false,
                        },
                    )
                }
                None => Task::none(),
            };
            Task::batch([remember, dispatch(app, CoreEvent::FileOpened(path))])
        }
        Message::PreferencesRead(result) => match result {
            Ok(patch) => dispatch(app, CoreEvent::PreferencesLoaded(patch)),
            Err(e) => {
                tracing::error!("Could not read preferences, using defaults: {e}");
                Task::none()
            }
        },
        Message::PreferencesSaved { result, reload } => match result {
            Ok(stored) if reload => dispatch(app, CoreEvent::PreferencesLoaded(stored)),
            Ok(_) => Task::none(),
            Err(e) => {
                tracing::error!("Could not save preferences: {e}");
                Task::none()
            }
        },
        Message::KeyEvent(key_event) => match key_event {
            keyboard::Event::KeyPressed { key, modifiers, .. } => {
                match shortcut(key.as_ref(), modifiers) {
                    Some(Shortcut::OpenFile) => open_dialog(dialog_start_dir(app)),
                    Some(Shortcut::ToggleFullscreen) => toggle_fullscreen(app),
                    Some(Shortcut::PlayPause) => dispatch(app, CoreEvent::PlayPause),
                    Some(Shortcut::SeekBy(delta)) => dispatch(app, CoreEvent::SeekBy(delta)),
                    Some(Shortcut::VolumeUp) => {
                        let volume = app.core.session.preferences.volume;
                        dispatch(
                            app,
                            CoreEvent::SetVolume(volume.saturating_add(VOLUME_STEP).min(MAX_VOLUME)),
                        )
                    }
                    Some(Shortcut::VolumeDown) => {
                        let volume = app.core.session.preferences.volume;
                        dispatch(app, CoreEvent::SetVolume(volume.saturating_sub(VOLUME_STEP)))
                    }
                    None => Task::none(),
                }
            }
            _ => Task::none(),
        },
        Message::TogglePreferences => {
            app.show_preferences = !app.show_preferences;
            Task::none()
        }
        Message::FftSizeSelected(size) => dispatch(
            app,
            CoreEvent::SavePreferences(PreferencesPatch {
                visualiser_fft_size: Some(size),
                ..PreferencesPatch::default()
            }),
        ),
        Message::EqStaysPausedToggled(enabled) => dispatch(
            app,
            CoreEvent::SavePreferences(PreferencesPatch {
                eq_stays_paused: Some(enabled),
                ..PreferencesPatch::default()
            }),
        ),
        Message::CloseRequested => dispatch(app, CoreEvent::Teardown).chain(iced::exit()),
    }
}

fn view(app: &App) -> Element<'_, Message> {
    let session = &app.core.session;
    let controls = controls::view_controls(session).map(Message::Control);

    let caption = session
        .now_playing()
        .unwrap_or_else(|| "Open a media file to begin".to_string());

    let visuals: Element<Message> = match session.target {
        Some(MediaKind::Video) if session.video.visible => center(text(caption).size(18))
            .width(Length::Fill)
            .height(Length::Fixed(VISUALS_HEIGHT))
            .style(container::dark)
            .into(),
        _ => {
            let left = canvas::Canvas::new(session.meters.gauge(Channel::Left))
                .width(Length::Fixed(METER_WIDTH))
                .height(Length::Fixed(VISUALS_HEIGHT));
            let right = canvas::Canvas::new(session.meters.gauge(Channel::Right))
                .width(Length::Fixed(METER_WIDTH))
                .height(Length::Fixed(VISUALS_HEIGHT));
            let spectrum = canvas::Canvas::new(SpectrumView { bins: app.core.bins() })
                .width(Length::Fill)
                .height(Length::Fixed(VISUALS_HEIGHT));

            column![
                text(caption).size(16),
                row![left, right, spectrum]
                    .spacing(6)
                    .align_y(Alignment::End),
                text(&session.readout).size(14),
            ]
            .spacing(6)
            .into()
        }
    };

    let prefs_label = if app.show_preferences {
        "Hide Preferences"
    } else {
        "Preferences"
    };
    let mut content = column![
        controls,
        container(button(text(prefs_label)).on_press(Message::TogglePreferences)).padding([0, 10]),
    ]
    .spacing(5);

    if app.show_preferences {
        content = content.push(view_preferences(&session.preferences));
    }
    content = content.push(container(visuals).padding(10));

    if let Some(err) = &session.error {
        content = content.push(
            container(text(format!("Error: {err}")).color(Color::from_rgb(1.0, 0.3, 0.3)))
                .padding(10),
        );
    }

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

fn view_preferences(preferences: &Preferences) -> Element<'_, Message> {
    let fft_size = row![
        text("Visualiser FFT size").size(14),
        pick_list(
            FFT_SIZE_CHOICES,
            Some(preferences.visualiser_fft_size),
            Message::FftSizeSelected,
        ),
    ]
    .spacing(10)
    .align_y(Alignment::Center);

    let freeze = toggler(preferences.eq_stays_paused)
        .label("Freeze visualiser while paused")
        .on_toggle(Message::EqStaysPausedToggled);

    container(column![fft_size, freeze].spacing(8))
        .padding(10)
        .into()
}

fn subscription(app: &App) -> Subscription<Message> {
    let poll = iced::time::every(Duration::from_millis(16)).map(|_| Message::Core(CoreEvent::Poll));
    let keys = keyboard::listen().map(Message::KeyEvent);
    let close = window::close_requests().map(|_| Message::CloseRequested);

    let mut subscriptions = vec![poll, keys, close];
    if app.core.is_animating() {
        subscriptions.push(window::frames().map(|_| Message::Core(CoreEvent::Tick)));
    }
    Subscription::batch(subscriptions)
}

fn theme(_app: &App) -> Theme {
    Theme::Dark
}

pub fn run() -> iced::Result {
    iced::application(boot, update, view)
        .title(title)
        .subscription(subscription)
        .theme(theme)
        .window_size((1000.0, 420.0))
        .exit_on_close_request(false)
        .run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyboard::key::Named;
    use keyboard::{Key, Modifiers};

    #[test]
    fn menu_shortcuts() {
        assert_eq!(
            shortcut(Key::Character("o"), Modifiers::COMMAND),
            Some(Shortcut::OpenFile)
        );
        assert_eq!(shortcut(Key::Character("o"), Modifiers::empty()), None);
        assert_eq!(
            shortcut(Key::Named(Named::F11), Modifiers::empty()),
            Some(Shortcut::ToggleFullscreen)
        );
    }

    #[test]
    fn transport_shortcuts() {
        assert_eq!(
            shortcut(Key::Named(Named::Space), Modifiers::empty()),
            Some(Shortcut::PlayPause)
        );
        assert_eq!(
            shortcut(Key::Named(Named::ArrowLeft), Modifiers::empty()),
            Some(Shortcut::SeekBy(-SEEK_STEP))
        );
        assert_eq!(
            shortcut(Key::Named(Named::ArrowDown), Modifiers::empty()),
            Some(Shortcut::VolumeDown)
        );
    }
}
