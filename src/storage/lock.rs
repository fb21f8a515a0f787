//! Exclusive repository lock.
//!
//! Every mutating command holds this lock from the moment the repository is
//! opened until its state files are written. Acquisition never blocks: a
//! second writer fails immediately with `RepositoryLocked`. The OS releases
//! the lock when the guard is dropped or the process dies.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::storage::error::{StorageError, StorageResult};

/// An exclusive lock on the repository, released on drop.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    file: Option<File>,
}

impl RepoLock {
    /// try to take the lock at `path`
    pub fn acquire(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "acquired repository lock");
                Ok(Self {
                    path: path.to_path_buf(),
                    file: Some(file),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(StorageError::RepositoryLocked),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(StorageError::RepositoryLocked)
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// release the lock explicitly
    pub fn release(mut self) -> StorageResult<()> {
        if let Some(file) = self.file.take() {
            file.unlock()?;
        }
        Ok(())
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lock");

        let lock = RepoLock::acquire(&path).unwrap();
        assert!(lock.is_held());
        assert_eq!(lock.path(), path);
        lock.release().unwrap();

        // free again after release
        let again = RepoLock::acquire(&path).unwrap();
        assert!(again.is_held());
    }

    #[test]
    fn test_second_writer_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lock");

        let _held = RepoLock::acquire(&path).unwrap();
        assert!(matches!(
            RepoLock::acquire(&path),
            Err(StorageError::RepositoryLocked)
        ));
    }

    #[test]
    fn test_drop_releases() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lock");

        {
            let _lock = RepoLock::acquire(&path).unwrap();
        }
        assert!(RepoLock::acquire(&path).is_ok());
    }
}
