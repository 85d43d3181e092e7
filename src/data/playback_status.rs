/// Playback status enumeration as published in the snapshot document
use serde::{Serialize, Deserialize};
use strum_macros::EnumString;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum PlaybackStatus {
    /// The publisher is up but has not looked at any session yet
    Starting,
    /// Media is actively playing
    Playing,
    /// Playback is paused
    Paused,
    /// Nothing is playing (or nothing that is allowed to be shown)
    Stopped,
    /// The session is switching tracks
    Changing,
    /// The session is open but has not started playback
    Opened,
    /// The session has been closed by its application
    Closed,
}

impl PlaybackStatus {
    /// Statuses after which no track information may be published
    pub fn clears_track(&self) -> bool {
        matches!(self, PlaybackStatus::Stopped | PlaybackStatus::Closed | PlaybackStatus::Starting)
    }

    pub fn is_playing(&self) -> bool {
        *self == PlaybackStatus::Playing
    }
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        PlaybackStatus::Stopped
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackStatus::Starting => write!(f, "Starting"),
            PlaybackStatus::Playing => write!(f, "Playing"),
            PlaybackStatus::Paused => write!(f, "Paused"),
            PlaybackStatus::Stopped => write!(f, "Stopped"),
            PlaybackStatus::Changing => write!(f, "Changing"),
            PlaybackStatus::Opened => write!(f, "Opened"),
            PlaybackStatus::Closed => write!(f, "Closed"),
        }
    }
}
