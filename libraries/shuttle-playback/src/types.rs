//! Core types for playback management

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Track identifier supplied by the library layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Create a new track ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Track reference handed to the queue
///
/// The playback core treats this as opaque: only `id` is used for identity,
/// the rest is carried for observers and the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Library identifier
    pub id: TrackId,

    /// File path for the backend
    pub path: PathBuf,

    /// Track title
    pub title: String,

    /// Artist name
    pub artist: String,

    /// Known duration from library metadata (optional)
    pub duration: Option<Duration>,
}

impl Track {
    /// Create a track with only an id and a path
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: TrackId::new(id),
            path: path.into(),
            title: String::new(),
            artist: String::new(),
            duration: None,
        }
    }
}

/// Queue-assigned identity of a queue entry
///
/// Stable for the life of the entry, independent of shuffle and reordering.
/// Two entries for the same track get distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueItemId(u64);

impl QueueItemId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A track wrapped with its queue identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Queue identity
    pub id: QueueItemId,

    /// Wrapped track
    pub track: Track,
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when queue ends
    #[default]
    Off,

    /// Loop current track only
    One,

    /// Loop entire queue
    All,
}

/// Playback state
///
/// `Error` is terminal for the current item only; the manager moves on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing loaded, or the queue ran out
    #[default]
    Idle,

    /// Backend is preparing a track
    Loading,

    /// Currently playing
    Playing,

    /// Paused mid-track (or prepared without autoplay)
    Paused,

    /// Current track reached its end
    Completed,

    /// Backend failed on the current track
    Error(String),
}

impl PlaybackState {
    /// Whether audio is audible in this state
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// Short lowercase name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(reason) => write!(f, "error ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Position and duration of the loaded track, in milliseconds
///
/// Recomputed on every poll, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Elapsed position
    pub position_ms: u64,

    /// Total duration (0 when unknown)
    pub duration_ms: u64,
}

/// Load generation tag
///
/// Incremented on every backend load so that events belonging to a
/// superseded load can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    /// Create a generation tag from a raw counter value
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Raw counter value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Configuration for playback manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Progress polling period in milliseconds (default: 100)
    pub progress_interval_ms: u64,

    /// Elapsed position below which "previous" navigates back instead of
    /// restarting the current track (default: 2000)
    pub restart_threshold_ms: u64,

    /// Initial repeat mode (default: Off)
    pub repeat: RepeatMode,

    /// Initial shuffle flag (default: false)
    pub shuffle: bool,

    /// Fixed shuffle seed; `None` seeds from entropy
    pub shuffle_seed: Option<u64>,
}

impl PlaybackConfig {
    /// Progress polling period as a `Duration`
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: 100,
            restart_threshold_ms: 2000,
            repeat: RepeatMode::Off,
            shuffle: false,
            shuffle_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PlaybackConfig::default();
        assert_eq!(config.progress_interval_ms, 100);
        assert_eq!(config.restart_threshold_ms, 2000);
        assert_eq!(config.repeat, RepeatMode::Off);
        assert!(!config.shuffle);
        assert!(config.shuffle_seed.is_none());
    }

    #[test]
    fn zero_interval_is_raised_to_one_millisecond() {
        let config = PlaybackConfig {
            progress_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.progress_interval(), Duration::from_millis(1));
    }

    #[test]
    fn state_display() {
        assert_eq!(PlaybackState::Playing.to_string(), "playing");
        assert_eq!(
            PlaybackState::Error("decode failed".to_string()).to_string(),
            "error (decode failed)"
        );
        assert!(PlaybackState::Playing.is_playing());
        assert!(!PlaybackState::Loading.is_playing());
    }

    #[test]
    fn generation_advances() {
        let gen = Generation::default();
        assert_eq!(gen.next().get(), 1);
        assert!(gen.next() > gen);
    }
}
