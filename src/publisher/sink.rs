use std::path::PathBuf;
use thiserror::Error;

use crate::data::{CoverBlob, NowPlayingSnapshot};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where snapshots go. Implementations must make each publication visible as a whole:
/// a reader sees either the previous or the new snapshot, and a snapshot that references
/// a cover is only visible while that cover can be fetched.
pub trait SnapshotSink: Send + Sync {
    fn publish(&self, snapshot: &NowPlayingSnapshot, cover: Option<&CoverBlob>) -> Result<(), PublishError>;
}

/// Make the pair consistent: a cover only travels with a snapshot that references it,
/// and a snapshot only references a cover that is present.
pub(crate) fn consistent<'a>(
    snapshot: &NowPlayingSnapshot,
    cover: Option<&'a CoverBlob>,
) -> (NowPlayingSnapshot, Option<&'a CoverBlob>) {
    match cover {
        Some(cover) if snapshot.cover_available() => (snapshot.clone(), Some(cover)),
        _ => (snapshot.clone().without_cover(), None),
    }
}
