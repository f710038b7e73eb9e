//! User preferences persisted to `<config_dir>/diamond-player/preferences.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analysis::spectrum::{validate_fft_size, DEFAULT_FFT_SIZE};
use crate::error::{PlayerError, Result};

pub const DEFAULT_VOLUME: u8 = 100;
pub const MAX_VOLUME: u8 = 100;

/// In-core preference values with every field resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    pub visualiser_fft_size: usize,
    pub volume: u8,
    pub eq_stays_paused: bool,
    pub last_opened_directory: Option<PathBuf>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            visualiser_fft_size: DEFAULT_FFT_SIZE,
            volume: DEFAULT_VOLUME,
            eq_stays_paused: false,
            last_opened_directory: None,
        }
    }
}

/// A partial set of preferences, as stored on disk or sent for saving.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferencesPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualiser_fft_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq_stays_paused: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_opened_directory: Option<PathBuf>,
}

impl PreferencesPatch {
    pub fn volume(volume: u8) -> Self {
        Self {
            volume: Some(volume),
            ..Self::default()
        }
    }

    pub fn last_opened_directory(dir: PathBuf) -> Self {
        Self {
            last_opened_directory: Some(dir),
            ..Self::default()
        }
    }

    /// Overlay `other` onto `self`; fields present in `other` win.
    pub fn merge(&mut self, other: PreferencesPatch) {
        if other.visualiser_fft_size.is_some() {
            self.visualiser_fft_size = other.visualiser_fft_size;
        }
        if other.volume.is_some() {
            self.volume = other.volume;
        }
        if other.eq_stays_paused.is_some() {
            self.eq_stays_paused = other.eq_stays_paused;
        }
        if other.last_opened_directory.is_some() {
            self.last_opened_directory = other.last_opened_directory;
        }
    }
}

impl Preferences {
    /// Apply the present fields of `patch`. Invalid FFT sizes are ignored.
    pub fn apply(&mut self, patch: &PreferencesPatch) {
        if let Some(size) = patch.visualiser_fft_size {
            match validate_fft_size(size) {
                Ok(size) => self.visualiser_fft_size = size,
                Err(e) => tracing::warn!("Ignoring visualiser FFT size preference: {e}"),
            }
        }
        if let Some(volume) = patch.volume {
            self.volume = volume.min(MAX_VOLUME);
        }
        if let Some(eq_stays_paused) = patch.eq_stays_paused {
            self.eq_stays_paused = eq_stays_paused;
        }
        if let Some(dir) = &patch.last_opened_directory {
            self.last_opened_directory = Some(dir.clone());
        }
    }
}

/// Reads and writes the preferences file.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the platform configuration directory.
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir().ok_or(PlayerError::NoConfigDir)?;
        Ok(Self::new(dir.join("diamond-player").join("preferences.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty patch.
    pub fn load(&self) -> Result<PreferencesPatch> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PreferencesPatch::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Merge `patch` into the stored preferences and return the result.
    pub fn save(&self, patch: PreferencesPatch) -> Result<PreferencesPatch> {
        let mut stored = self.load()?;
        stored.merge(patch);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string_pretty(&stored)?)?;
        tracing::debug!("Saved preferences to {}", self.path.display());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_player_defaults() {
        let prefs = Preferences::default();
        assert_eq!(prefs.visualiser_fft_size, 1024);
        assert_eq!(prefs.volume, 100);
        assert!(!prefs.eq_stays_paused);
    }

    #[test]
    fn absent_fields_keep_current_values() {
        let mut prefs = Preferences {
            visualiser_fft_size: 2048,
            volume: 40,
            eq_stays_paused: true,
            last_opened_directory: None,
        };
        prefs.apply(&PreferencesPatch::volume(70));
        assert_eq!(prefs.volume, 70);
        assert_eq!(prefs.visualiser_fft_size, 2048);
        assert!(prefs.eq_stays_paused);
    }

    #[test]
    fn invalid_fft_size_is_ignored() {
        let mut prefs = Preferences::default();
        prefs.apply(&PreferencesPatch {
            visualiser_fft_size: Some(1000),
            ..PreferencesPatch::default()
        });
        assert_eq!(prefs.visualiser_fft_size, 1024);
    }

    #[test]
    fn volume_is_clamped() {
        let mut prefs = Preferences::default();
        prefs.apply(&PreferencesPatch::volume(250));
        assert_eq!(prefs.volume, 100);
    }

    #[test]
    fn missing_file_loads_empty_patch() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::new(dir.path().join("nope.toml"));
        assert_eq!(store.load().unwrap(), PreferencesPatch::default());
    }

    #[test]
    fn save_merges_with_stored_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::new(dir.path().join("sub").join("preferences.toml"));

        store
            .save(PreferencesPatch {
                visualiser_fft_size: Some(4096),
                ..PreferencesPatch::default()
            })
            .unwrap();
        let merged = store.save(PreferencesPatch::volume(30)).unwrap();

        assert_eq!(merged.visualiser_fft_size, Some(4096));
        assert_eq!(merged.volume, Some(30));
        assert_eq!(store.load().unwrap(), merged);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        fs::write(&path, "volume = \"loud\"").unwrap();
        let err = PreferenceStore::new(path).load().unwrap_err();
        assert!(matches!(err, PlayerError::ConfigParse(_)));
    }
}
