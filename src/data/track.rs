use serde::{Deserialize, Serialize};
use std::fmt;

/// What makes two snapshots "the same track". Progress and timestamps are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct TrackIdentity {
    pub title: String,
    pub artist: String,
    pub album: String,
}

impl TrackIdentity {
    pub fn new(title: &str, artist: &str, album: &str) -> Self {
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
    }
}

impl fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)?;
        if !self.artist.is_empty() {
            write!(f, " by {}", self.artist)?;
        }
        if !self.album.is_empty() {
            write!(f, " (Album: {})", self.album)?;
        }
        Ok(())
    }
}
