//! Recognized media types and the folder playlist.

use std::fs;
use std::path::{Path, PathBuf};

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "aac", "m4a", "ogg", "opus", "wav"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "ogv"];

/// Which media element a file plays through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Classify by extension, case-insensitively. `None` for anything else.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Audio)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

pub fn is_supported(path: &Path) -> bool {
    MediaKind::from_path(path).is_some()
}

/// Folder holding `path`. A bare file name lives in the working directory.
pub fn parent_folder(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Sibling media files of the current folder with a cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Playlist {
    pub folder: PathBuf,
    pub entries: Vec<String>,
    pub current: Option<usize>,
}

impl Playlist {
    pub fn new(folder: PathBuf, entries: Vec<String>, current: Option<usize>) -> Self {
        let current = current.filter(|&i| i < entries.len());
        Self {
            folder,
            entries,
            current,
        }
    }

    /// List the folder containing `selected` and position the cursor on it.
    ///
    /// A folder that cannot be read yields an empty playlist.
    pub fn scan(selected: &Path) -> Self {
        let folder = parent_folder(selected);

        let mut entries: Vec<String> = match fs::read_dir(&folder) {
            Ok(dir) => dir
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().map(|t| !t.is_dir()).unwrap_or(false))
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| is_supported(Path::new(name)))
                .collect(),
            Err(e) => {
                tracing::error!("Error reading directory {}: {e}", folder.display());
                return Self {
                    folder,
                    ..Self::default()
                };
            }
        };
        entries.sort();

        let current = selected
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| entries.iter().position(|e| e == name));

        Self {
            folder,
            entries,
            current,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn can_previous(&self) -> bool {
        matches!(self.current, Some(i) if i > 0)
    }

    /// With no known position, "next" starts from the first entry.
    pub fn can_next(&self) -> bool {
        match self.current {
            Some(i) => i + 1 < self.entries.len(),
            None => !self.entries.is_empty(),
        }
    }

    /// Step back; `None` at the first entry.
    pub fn previous(&mut self) -> Option<PathBuf> {
        if !self.can_previous() {
            return None;
        }
        let index = self.current? - 1;
        self.current = Some(index);
        Some(self.path_at(index))
    }

    /// Step forward; `None` at the last entry.
    pub fn next(&mut self) -> Option<PathBuf> {
        if !self.can_next() {
            return None;
        }
        let index = self.current.map_or(0, |i| i + 1);
        self.current = Some(index);
        Some(self.path_at(index))
    }

    /// Move the cursor to `path` if it lives in this folder.
    pub fn select(&mut self, path: &Path) -> bool {
        if parent_folder(path) != self.folder {
            return false;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.current = self.entries.iter().position(|e| e == name);
        self.current.is_some()
    }

    fn path_at(&self, index: usize) -> PathBuf {
        self.folder.join(&self.entries[index])
    }
}
