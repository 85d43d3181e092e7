use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use fs2::FileExt;
use log::{debug, warn};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Failed to open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Process-wide advisory lock on an output location.
///
/// Acquisition never blocks: if another process holds the lock, `try_acquire` returns
/// `Ok(None)` and the caller is expected to exit quietly. The lock is released on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    file: Option<File>,
}

impl InstanceLock {
    pub fn try_acquire<P: AsRef<Path>>(path: P) -> Result<Option<Self>, LockError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Open { path: path.clone(), source })?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if is_contention(&e) => {
                debug!("Lock {:?} is held by another instance", path);
                return Ok(None);
            }
            Err(source) => return Err(LockError::Lock { path, source }),
        }

        // Informational only
        if let Err(e) = file.set_len(0).and_then(|_| write!(file, "{}", std::process::id())) {
            debug!("Could not record pid in {:?}: {}", path, e);
        }

        debug!("Acquired instance lock {:?}", path);
        Ok(Some(Self { path, file: Some(file) }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly; dropping the value does the same
    pub fn release(mut self) {
        self.unlock();
    }

    fn unlock(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                warn!("Failed to release instance lock {:?}: {}", self.path, e);
            } else {
                debug!("Released instance lock {:?}", self.path);
            }
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        self.unlock();
    }
}

fn is_contention(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
