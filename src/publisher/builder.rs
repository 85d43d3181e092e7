use std::sync::{Arc, Mutex};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::constants::COVER_FILE;
use crate::data::{CoverBlob, NowPlayingSnapshot, TrackSnapshot};
use crate::filter::FilterEngine;
use crate::publisher::sink::{PublishError, SnapshotSink};
use crate::session::{SessionListener, SessionReading};

/// Turns session readings into snapshots and hands them to a sink.
///
/// Readings arrive one at a time from the session adapter, so the publisher never sees
/// two overlapping computations. Whatever the sink does with a failed write, the next
/// reading simply publishes again.
pub struct NowPlayingPublisher {
    sink: Arc<dyn SnapshotSink>,
    filter: Arc<FilterEngine>,
    last: Mutex<Option<NowPlayingSnapshot>>,
}

impl NowPlayingPublisher {
    pub fn new(sink: Arc<dyn SnapshotSink>, filter: Arc<FilterEngine>) -> Self {
        Self {
            sink,
            filter,
            last: Mutex::new(None),
        }
    }

    pub fn filter(&self) -> &Arc<FilterEngine> {
        &self.filter
    }

    /// Build the snapshot and cover for a reading as of `now`.
    pub fn build(&self, reading: Option<&SessionReading>, now: DateTime<Utc>) -> (NowPlayingSnapshot, Option<CoverBlob>) {
        let Some(reading) = reading else {
            return (NowPlayingSnapshot::stopped(), None);
        };

        let props = &reading.properties;
        if reading.status.clears_track() || props.title.trim().is_empty() {
            return (NowPlayingSnapshot::stopped(), None);
        }
        if !self.filter.allows(&reading.app_id, &props.title, &props.artist, &props.album) {
            debug!("{} from '{}' is not allowed, publishing Stopped", props.identity(), reading.app_id);
            return (NowPlayingSnapshot::stopped(), None);
        }

        let (duration_ms, progress_ms) = match &reading.timeline {
            Some(timeline) => {
                let mut position = timeline.position_ms;
                if reading.status.is_playing() {
                    if let Some(updated) = timeline.last_updated {
                        let elapsed = (now - updated).num_milliseconds().max(0) as u64;
                        position = position.saturating_add(elapsed);
                    }
                }
                (timeline.duration_ms, position)
            }
            None => (0, 0),
        };

        let cover = reading.cover.clone();
        let track = TrackSnapshot {
            is_playing: reading.status.is_playing(),
            title: props.title.clone(),
            artist: props.artist.clone(),
            album: props.album.clone(),
            duration_ms,
            progress_ms,
            app_id: reading.app_id.clone(),
            cover_path: cover.as_ref().map(|_| COVER_FILE.to_string()),
            updated_at: now,
        };

        (NowPlayingSnapshot::with_track(reading.status, track), cover)
    }

    fn publish(&self, snapshot: NowPlayingSnapshot, cover: Option<&CoverBlob>) -> Result<(), PublishError> {
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let changed_track = last.as_ref().map(|l| l.identity()) != Some(snapshot.identity());
        self.sink.publish(&snapshot, cover)?;
        if changed_track {
            info!("Now playing: {}", snapshot);
        }
        *last = Some(snapshot);
        Ok(())
    }

    pub fn publish_starting(&self) -> Result<(), PublishError> {
        self.publish(NowPlayingSnapshot::starting(), None)
    }

    pub fn publish_stopped(&self) -> Result<(), PublishError> {
        self.publish(NowPlayingSnapshot::stopped(), None)
    }

    /// The snapshot most recently handed to the sink
    pub fn last_published(&self) -> Option<NowPlayingSnapshot> {
        self.last.lock().ok().and_then(|l| l.clone())
    }
}

impl SessionListener for NowPlayingPublisher {
    fn on_session_update(&self, reading: Option<SessionReading>) {
        let (snapshot, cover) = self.build(reading.as_ref(), Utc::now());
        if let Err(e) = self.publish(snapshot, cover.as_ref()) {
            warn!("Failed to publish snapshot: {}", e);
        }
    }
}
