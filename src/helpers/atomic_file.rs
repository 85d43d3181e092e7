use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Temporary sibling used while `target` is being written
pub fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Write `data` to `target` so that readers see either the old or the new content, never a
/// partial file: write a sibling temp file, flush it to disk, then rename it over the target.
pub fn write_atomic(target: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = temp_path(target);

    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, target)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Remove a file, treating "already gone" as success. Returns whether a file was removed.
pub fn remove_if_exists(target: &Path) -> io::Result<bool> {
    match fs::remove_file(target) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Write `data` only when `target` does not exist yet. Returns whether the file was written.
pub fn write_if_absent(target: &Path, data: &[u8]) -> io::Result<bool> {
    if target.exists() {
        return Ok(false);
    }
    write_atomic(target, data)?;
    Ok(true)
}

/// Read a file, treating a missing (or vanished) file as absence
pub fn read_if_exists(target: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(target) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
