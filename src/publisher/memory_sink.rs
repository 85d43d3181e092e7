use std::sync::Arc;
use arc_swap::ArcSwap;
use log::debug;

use crate::data::{CoverBlob, NowPlayingSnapshot};
use crate::publisher::sink::{consistent, PublishError, SnapshotSink};

/// One published state: the snapshot, its serialized form and the cover it references
#[derive(Debug, Clone)]
pub struct Published {
    pub snapshot: NowPlayingSnapshot,
    pub json: String,
    pub cover: Option<CoverBlob>,
}

impl Published {
    fn new(snapshot: NowPlayingSnapshot, cover: Option<CoverBlob>) -> Result<Self, PublishError> {
        let json = snapshot.to_json()?;
        Ok(Self { snapshot, json, cover })
    }
}

/// Keeps the latest publication in memory behind a single atomically swapped reference.
/// Readers never lock and never see a snapshot paired with another publication's cover.
pub struct MemorySink {
    current: ArcSwap<Published>,
}

impl MemorySink {
    pub fn new() -> Self {
        let starting = NowPlayingSnapshot::starting();
        let json = starting.to_json().unwrap_or_else(|_| r#"{"status":"Starting"}"#.to_string());
        Self {
            current: ArcSwap::from_pointee(Published { snapshot: starting, json, cover: None }),
        }
    }

    /// The latest publication. Hold on to the returned value for the whole request.
    pub fn load(&self) -> Arc<Published> {
        self.current.load_full()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSink for MemorySink {
    fn publish(&self, snapshot: &NowPlayingSnapshot, cover: Option<&CoverBlob>) -> Result<(), PublishError> {
        let (snapshot, cover) = consistent(snapshot, cover);
        let published = Published::new(snapshot, cover.cloned())?;
        debug!("Published {}", published.snapshot);
        self.current.store(Arc::new(published));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PlaybackStatus, TrackSnapshot};
    use chrono::Utc;
    use std::thread;

    fn playing(title: &str) -> NowPlayingSnapshot {
        NowPlayingSnapshot::with_track(
            PlaybackStatus::Playing,
            TrackSnapshot {
                is_playing: true,
                title: title.into(),
                artist: "Artist Y".into(),
                album: "Album Z".into(),
                duration_ms: 100,
                progress_ms: 1,
                app_id: "Spotify.exe".into(),
                cover_path: Some("cover.jpg".into()),
                updated_at: Utc::now(),
            },
        )
    }

    #[test]
    fn test_starts_with_starting_document() {
        let sink = MemorySink::new();
        assert_eq!(sink.load().json, r#"{"status":"Starting"}"#);
        assert!(sink.load().cover.is_none());
    }

    #[test]
    fn test_publish_and_clear() {
        let sink = MemorySink::new();
        let cover = CoverBlob::from_bytes(vec![0xFF, 0xD8, 7]).unwrap();
        sink.publish(&playing("Song X"), Some(&cover)).unwrap();

        let published = sink.load();
        assert!(published.snapshot.cover_available());
        assert_eq!(published.cover.as_ref().unwrap(), &cover);
        let parsed: NowPlayingSnapshot = serde_json::from_str(&published.json).unwrap();
        assert_eq!(parsed, published.snapshot);

        sink.publish(&NowPlayingSnapshot::stopped(), Some(&cover)).unwrap();
        let published = sink.load();
        assert_eq!(published.json, r#"{"status":"Stopped"}"#);
        assert!(published.cover.is_none());
    }

    #[test]
    fn test_readers_always_see_consistent_pairs() {
        let sink = Arc::new(MemorySink::new());
        let writer = {
            let sink = sink.clone();
            thread::spawn(move || {
                for i in 0..2_000u32 {
                    if i % 2 == 0 {
                        let cover = CoverBlob::from_bytes(i.to_be_bytes().to_vec()).unwrap();
                        sink.publish(&playing(&format!("Song {}", i)), Some(&cover)).unwrap();
                    } else {
                        sink.publish(&NowPlayingSnapshot::stopped(), None).unwrap();
                    }
                }
            })
        };

        for _ in 0..2_000 {
            let published = sink.load();
            assert_eq!(published.snapshot.cover_available(), published.cover.is_some());
            if let (Some(track), Some(cover)) = (published.snapshot.track(), published.cover.as_ref()) {
                let n: u32 = track.title.trim_start_matches("Song ").parse().unwrap();
                assert_eq!(cover.bytes().as_ref(), n.to_be_bytes());
            }
        }
        writer.join().unwrap();
    }
}
