use std::time::Duration;
use chrono::{DateTime, Utc};

use crate::data::TrackSnapshot;

/// Position to display for a snapshot at `now`.
///
/// While playing, the reported position advances by the time elapsed since `updated_at`.
/// A snapshot older than `stale_after` is treated as paused and keeps its reported
/// position. The result never exceeds the duration when one is known.
pub fn extrapolate_progress(track: &TrackSnapshot, now: DateTime<Utc>, stale_after: Duration) -> u64 {
    let mut progress = track.progress_ms;

    if track.is_playing {
        let age_ms = (now - track.updated_at).num_milliseconds();
        if age_ms > 0 && (age_ms as u128) <= stale_after.as_millis() {
            progress = progress.saturating_add(age_ms as u64);
        }
    }

    if track.duration_ms > 0 {
        progress.min(track.duration_ms)
    } else {
        progress
    }
}
