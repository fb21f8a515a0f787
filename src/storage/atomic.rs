//! Crash-safe file writes.
//!
//! State files are replaced by writing a sibling temp file, syncing it and
//! renaming it over the target. Objects are content-addressed, so they are
//! only ever created: the rename refuses to clobber an existing object.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

fn staged_temp(path: &Path, bytes: &[u8]) -> io::Result<NamedTempFile> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    Ok(temp)
}

/// replace `path` with `bytes` atomically
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let temp = staged_temp(path, bytes)?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// create `path` with `bytes` unless it already exists
///
/// returns `true` if this call created the file
pub(crate) fn write_if_absent(path: &Path, bytes: &[u8]) -> io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let temp = staged_temp(path, bytes)?;
    match temp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}
