//! Content-addressed blob storage.
//!
//! Each blob is stored once under `objects/<sha256>`. Writing the same
//! bytes twice is a no-op, so the store doubles as a dedup layer for
//! file contents across every commit.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::storage::atomic;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BlobId, ObjectId};

/// the object directory of a repository
#[derive(Debug, Clone)]
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, id: BlobId) -> PathBuf {
        self.dir.join(id.to_hex())
    }

    /// store `bytes`, returning their id
    ///
    /// the digest is computed in memory first, so existing content costs no write
    pub fn put(&self, bytes: &[u8]) -> StorageResult<BlobId> {
        let id = BlobId::new(ObjectId::digest(bytes));
        if atomic::write_if_absent(&self.path_of(id), bytes)? {
            tracing::debug!(blob = %id, size = bytes.len(), "stored blob");
        }
        Ok(id)
    }

    /// read a blob's content
    pub fn get(&self, id: BlobId) -> StorageResult<Vec<u8>> {
        fs::read(self.path_of(id)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::ObjectNotFound(id.to_hex()),
            _ => StorageError::Io(e),
        })
    }

    pub fn contains(&self, id: BlobId) -> bool {
        self.path_of(id).is_file()
    }

    /// number of stored blobs
    pub fn len(&self) -> StorageResult<usize> {
        let mut count = 0;
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            // leftover temp files are not objects
            if name.to_str().is_some_and(|n| ObjectId::from_hex(n).is_ok()) {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}
