use log::info;

use crate::client::config::Animation;
use crate::data::{TrackIdentity, TrackSnapshot};
use crate::helpers::musicbrainz::TrackMetadata;

/// What the overlay shows for a track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackView {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub is_playing: bool,
    pub progress_ms: u64,
    pub duration_ms: u64,
    /// Cover location; `None` resets to the no-cover look
    pub cover: Option<String>,
}

impl TrackView {
    pub fn from_track(track: &TrackSnapshot, progress_ms: u64) -> Self {
        Self {
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            is_playing: track.is_playing,
            progress_ms,
            duration_ms: track.duration_ms,
            cover: track.cover_path.clone(),
        }
    }

    pub fn identity(&self) -> TrackIdentity {
        TrackIdentity::new(&self.title, &self.artist, &self.album)
    }
}

/// Presentation side of the overlay client
pub trait Renderer: Send {
    fn enter(&mut self, view: &TrackView, animation: Animation);
    fn exit(&mut self, animation: Animation);
    fn update_in_place(&mut self, view: &TrackView);
    fn progress(&mut self, progress_ms: u64, duration_ms: u64);
    fn apply_enrichment(&mut self, metadata: &TrackMetadata);
    fn show_qr(&mut self, url: &str, text: &str);
    fn show_music(&mut self);
}

/// Writes every presentation step to the log
#[derive(Debug, Default)]
pub struct LogRenderer {
    title: String,
}

impl LogRenderer {
    pub fn new(title: &str) -> Self {
        Self { title: title.to_string() }
    }
}

fn format_ms(ms: u64) -> String {
    let seconds = ms / 1000;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

impl Renderer for LogRenderer {
    fn enter(&mut self, view: &TrackView, animation: Animation) {
        let state = if view.is_playing { "playing" } else { "paused" };
        info!(
            "{}[{}] {} by {} ({}) {} {}/{}{}",
            if self.title.is_empty() { String::new() } else { format!("{} ", self.title) },
            animation,
            view.title,
            view.artist,
            view.album,
            state,
            format_ms(view.progress_ms),
            format_ms(view.duration_ms),
            view.cover.as_deref().map(|c| format!(" cover {}", c)).unwrap_or_default()
        );
    }

    fn exit(&mut self, animation: Animation) {
        info!("[{}] hide", animation);
    }

    fn update_in_place(&mut self, view: &TrackView) {
        info!("{} {}", if view.is_playing { "Playing" } else { "Paused" }, view.identity());
    }

    fn progress(&mut self, progress_ms: u64, duration_ms: u64) {
        log::debug!("{}/{}", format_ms(progress_ms), format_ms(duration_ms));
    }

    fn apply_enrichment(&mut self, metadata: &TrackMetadata) {
        let year = metadata.year.map(|y| y.to_string()).unwrap_or_default();
        info!("{} {}", year, metadata.genres.join(", "));
    }

    fn show_qr(&mut self, url: &str, text: &str) {
        info!("QR {} {}", url, text);
    }

    fn show_music(&mut self) {
        info!("Music view");
    }
}
