use std::sync::Arc;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::data::{PlaybackStatus, TrackIdentity};

/// Errors reported by a media session source. All of them are treated as transient.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Media session service unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read {what}: {message}")]
    Fetch { what: &'static str, message: String },

    #[error("Failed to subscribe to {0} changes: {1}")]
    Subscribe(&'static str, String),
}

impl SessionError {
    pub fn fetch(what: &'static str, message: impl ToString) -> Self {
        SessionError::Fetch { what, message: message.to_string() }
    }
}

/// The independent notification kinds a session fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Title, artist, album or thumbnail changed
    Properties,
    /// Position or duration changed
    Timeline,
    /// Playback status changed
    Playback,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 3] = [ChangeKind::Properties, ChangeKind::Timeline, ChangeKind::Playback];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Properties => "media properties",
            ChangeKind::Timeline => "timeline",
            ChangeKind::Playback => "playback info",
        }
    }
}

/// Handle returned by a subscription, used to remove it again
pub type SubscriptionToken = u64;

/// Callback fired by the platform on its own threads
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaProperties {
    pub title: String,
    pub artist: String,
    pub album: String,
}

impl MediaProperties {
    pub fn identity(&self) -> TrackIdentity {
        TrackIdentity::new(&self.title, &self.artist, &self.album)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineReading {
    pub position_ms: u64,
    pub duration_ms: u64,
    /// When the session last reported its position, if it says
    pub last_updated: Option<DateTime<Utc>>,
}

/// One media-playing application's session, owned by the platform
pub trait MediaSession: Send + Sync {
    /// Identifier of the application that owns the session
    fn app_id(&self) -> String;

    fn properties(&self) -> Result<MediaProperties, SessionError>;

    fn timeline(&self) -> Result<TimelineReading, SessionError>;

    fn playback_status(&self) -> Result<PlaybackStatus, SessionError>;

    /// Raw thumbnail bytes, `None` when the session has no thumbnail
    fn thumbnail(&self) -> Result<Option<Vec<u8>>, SessionError>;

    fn subscribe(&self, kind: ChangeKind, callback: ChangeCallback) -> Result<SubscriptionToken, SessionError>;

    fn unsubscribe(&self, token: SubscriptionToken);
}

/// The platform service that knows which session is current
pub trait MediaSessionSource: Send + Sync {
    fn current_session(&self) -> Result<Option<Arc<dyn MediaSession>>, SessionError>;

    /// Fire `callback` whenever the current session is replaced
    fn subscribe_session_changed(&self, callback: ChangeCallback) -> Result<SubscriptionToken, SessionError>;

    fn unsubscribe_session_changed(&self, token: SubscriptionToken);
}
