use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::{PlaybackStatus, TrackIdentity};

/// Track fields of a snapshot. Only present while something allowed is playing or paused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackSnapshot {
    pub is_playing: bool,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
    pub progress_ms: u64,
    pub app_id: String,
    /// Relative location of the cover blob, `None` when no cover is available
    pub cover_path: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TrackSnapshot {
    pub fn identity(&self) -> TrackIdentity {
        TrackIdentity::new(&self.title, &self.artist, &self.album)
    }
}

/// The canonical now-playing document.
///
/// A snapshot either carries a full set of track fields or none at all; statuses that
/// clear the track (`Stopped`, `Closed`, `Starting`) never carry a title, artist, album
/// or cover reference. The constructors enforce this, which is why the fields are private.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NowPlayingSnapshot {
    status: PlaybackStatus,
    #[serde(flatten)]
    track: Option<TrackSnapshot>,
}

impl NowPlayingSnapshot {
    /// Document published before the first session has been looked at
    pub fn starting() -> Self {
        Self { status: PlaybackStatus::Starting, track: None }
    }

    /// Document published when nothing (allowed) is playing
    pub fn stopped() -> Self {
        Self { status: PlaybackStatus::Stopped, track: None }
    }

    /// Build a snapshot for a track. Statuses that clear the track yield a stopped snapshot.
    pub fn with_track(status: PlaybackStatus, mut track: TrackSnapshot) -> Self {
        if status.clears_track() {
            return Self::stopped();
        }
        track.is_playing = status.is_playing();
        if track.duration_ms > 0 && track.progress_ms > track.duration_ms {
            track.progress_ms = track.duration_ms;
        }
        Self { status, track: Some(track) }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn track(&self) -> Option<&TrackSnapshot> {
        self.track.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.track.as_ref().map(|t| t.is_playing).unwrap_or(false)
    }

    pub fn cover_available(&self) -> bool {
        self.track.as_ref().map(|t| t.cover_path.is_some()).unwrap_or(false)
    }

    pub fn identity(&self) -> Option<TrackIdentity> {
        self.track.as_ref().map(|t| t.identity())
    }

    /// Drop the cover reference, keeping everything else
    pub fn without_cover(mut self) -> Self {
        if let Some(track) = self.track.as_mut() {
            track.cover_path = None;
        }
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Default for NowPlayingSnapshot {
    fn default() -> Self {
        Self::starting()
    }
}

impl fmt::Display for NowPlayingSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.track {
            Some(track) => write!(f, "[{}] {} by {} ({})", self.status, track.title, track.artist, track.album),
            None => write!(f, "[{}]", self.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_track() -> TrackSnapshot {
        TrackSnapshot {
            is_playing: true,
            title: "Song X".to_string(),
            artist: "Artist Y".to_string(),
            album: "Album Z".to_string(),
            duration_ms: 200_000,
            progress_ms: 12_000,
            app_id: "Spotify.exe".to_string(),
            cover_path: Some("cover.jpg".to_string()),
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_stopped_document_is_minimal() {
        let json = NowPlayingSnapshot::stopped().to_json().unwrap();
        assert_eq!(json, r#"{"status":"Stopped"}"#);
        let json = NowPlayingSnapshot::starting().to_json().unwrap();
        assert_eq!(json, r#"{"status":"Starting"}"#);
    }

    #[test]
    fn test_playing_document_fields() {
        let snapshot = NowPlayingSnapshot::with_track(PlaybackStatus::Playing, sample_track());
        let value: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(value["status"], "Playing");
        assert_eq!(value["is_playing"], true);
        assert_eq!(value["title"], "Song X");
        assert_eq!(value["artist"], "Artist Y");
        assert_eq!(value["album"], "Album Z");
        assert_eq!(value["duration_ms"], 200_000);
        assert_eq!(value["progress_ms"], 12_000);
        assert_eq!(value["app_id"], "Spotify.exe");
        assert_eq!(value["cover_path"], "cover.jpg");
        assert_eq!(value["updated_at"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_cover_path_serializes_as_null() {
        let snapshot = NowPlayingSnapshot::with_track(PlaybackStatus::Paused, sample_track()).without_cover();
        let value: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert!(value["cover_path"].is_null());
        assert_eq!(value["is_playing"], false);
        assert!(!snapshot.cover_available());
    }

    #[test]
    fn test_stopped_status_clears_everything() {
        let snapshot = NowPlayingSnapshot::with_track(PlaybackStatus::Stopped, sample_track());
        assert_eq!(snapshot, NowPlayingSnapshot::stopped());
        assert!(snapshot.track().is_none());
        assert!(!snapshot.cover_available());
    }

    #[test]
    fn test_progress_clamped_to_duration() {
        let mut track = sample_track();
        track.progress_ms = 250_000;
        let snapshot = NowPlayingSnapshot::with_track(PlaybackStatus::Playing, track);
        assert_eq!(snapshot.track().unwrap().progress_ms, 200_000);
    }

    #[test]
    fn test_parse_back() {
        let snapshot = NowPlayingSnapshot::with_track(PlaybackStatus::Playing, sample_track());
        let parsed: NowPlayingSnapshot = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(parsed, snapshot);

        let parsed: NowPlayingSnapshot = serde_json::from_str(r#"{"status":"Stopped"}"#).unwrap();
        assert_eq!(parsed, NowPlayingSnapshot::stopped());
    }
}
