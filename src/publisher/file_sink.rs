use std::path::{Path, PathBuf};
use std::sync::Mutex;
use log::{debug, trace};

use crate::constants::{COVER_FILE, SNAPSHOT_FILE};
use crate::data::{CoverBlob, NowPlayingSnapshot};
use crate::helpers::atomic_file::{remove_if_exists, write_atomic};
use crate::publisher::sink::{consistent, PublishError, SnapshotSink};

/// Publishes into a directory: `nowplaying.json` plus `cover.jpg`.
///
/// Both files are replaced atomically. A new cover is written before the snapshot that
/// references it; a cover is only deleted after a snapshot without the reference is in place.
pub struct FileSink {
    directory: PathBuf,
    /// Fingerprint of the cover currently on disk
    written_cover: Mutex<Option<u64>>,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            written_cover: Mutex::new(None),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.directory.join(SNAPSHOT_FILE)
    }

    pub fn cover_path(&self) -> PathBuf {
        self.directory.join(COVER_FILE)
    }

    fn write(path: &Path, data: &[u8]) -> Result<(), PublishError> {
        write_atomic(path, data).map_err(|source| PublishError::Io { path: path.to_path_buf(), source })
    }
}

impl SnapshotSink for FileSink {
    fn publish(&self, snapshot: &NowPlayingSnapshot, cover: Option<&CoverBlob>) -> Result<(), PublishError> {
        let (snapshot, cover) = consistent(snapshot, cover);
        let json = snapshot.to_json()?;
        let snapshot_path = self.snapshot_path();
        let cover_path = self.cover_path();

        // One publication at a time
        let mut written_cover = match self.written_cover.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match cover {
            Some(cover) => {
                let fingerprint = cover.fingerprint();
                if *written_cover != Some(fingerprint) || !cover_path.exists() {
                    Self::write(&cover_path, cover.bytes())?;
                    *written_cover = Some(fingerprint);
                    debug!("Wrote {} byte cover to {:?}", cover.len(), cover_path);
                } else {
                    trace!("Cover unchanged, not rewriting");
                }
                Self::write(&snapshot_path, json.as_bytes())?;
            }
            None => {
                Self::write(&snapshot_path, json.as_bytes())?;
                if remove_if_exists(&cover_path)
                    .map_err(|source| PublishError::Io { path: cover_path.clone(), source })?
                {
                    debug!("Removed cover {:?}", cover_path);
                }
                *written_cover = None;
            }
        }

        debug!("Published {}", snapshot);
        Ok(())
    }
}
