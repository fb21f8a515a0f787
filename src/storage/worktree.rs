//! Working directory access.
//!
//! The repository never touches the working directory directly; it goes
//! through the `WorkTree` capability so the orchestration logic can be driven
//! against something other than the real filesystem.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::storage::error::StorageResult;
use crate::storage::types::FileName;

/// Read, write, delete and enumerate the plain files of a working directory.
pub trait WorkTree {
    /// contents of `path`, or `None` when the file does not exist
    fn read(&self, path: &FileName) -> StorageResult<Option<Vec<u8>>>;

    /// create or overwrite `path`
    fn write(&self, path: &FileName, contents: &[u8]) -> StorageResult<()>;

    /// remove `path`; returns false when it was already absent
    fn delete(&self, path: &FileName) -> StorageResult<bool>;

    /// every plain file in the working directory, sorted
    fn list(&self) -> StorageResult<Vec<FileName>>;

    fn exists(&self, path: &FileName) -> StorageResult<bool> {
        Ok(self.read(path)?.is_some())
    }
}

/// The working directory on disk.
#[derive(Debug, Clone)]
pub struct FsWorkTree {
    root: PathBuf,
    repo_dir_name: String,
}

impl FsWorkTree {
    pub fn new(root: impl Into<PathBuf>, repo_dir_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            repo_dir_name: repo_dir_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, path: &FileName) -> PathBuf {
        self.root.join(path.as_str())
    }
}

impl WorkTree for FsWorkTree {
    fn read(&self, path: &FileName) -> StorageResult<Option<Vec<u8>>> {
        let full = self.path_of(path);
        if !full.is_file() {
            return Ok(None);
        }
        match fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &FileName, contents: &[u8]) -> StorageResult<()> {
        fs::write(self.path_of(path), contents)?;
        Ok(())
    }

    fn delete(&self, path: &FileName) -> StorageResult<bool> {
        match fs::remove_file(self.path_of(path)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> StorageResult<Vec<FileName>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let raw = entry.file_name();
            let Some(name) = raw.to_str() else {
                tracing::warn!(file = ?raw, "skipping working file with a non-UTF-8 name");
                continue;
            };
            if name == self.repo_dir_name {
                continue;
            }
            match FileName::new(name) {
                Ok(file) => files.push(file),
                Err(e) => tracing::warn!(file = name, error = %e, "skipping working file"),
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FsWorkTree) {
        let dir = TempDir::new().unwrap();
        let tree = FsWorkTree::new(dir.path(), ".grove");
        (dir, tree)
    }

    fn name(s: &str) -> FileName {
        FileName::new(s).unwrap()
    }

    #[test]
    fn test_write_read_delete() {
        let (_dir, tree) = setup();
        let f = name("f.txt");

        assert_eq!(tree.read(&f).unwrap(), None);
        tree.write(&f, b"hello").unwrap();
        assert_eq!(tree.read(&f).unwrap(), Some(b"hello".to_vec()));
        assert!(tree.exists(&f).unwrap());

        assert!(tree.delete(&f).unwrap());
        assert!(!tree.delete(&f).unwrap());
        assert!(!tree.exists(&f).unwrap());
    }

    #[test]
    fn test_list_plain_files_only() {
        let (dir, tree) = setup();
        fs::create_dir(dir.path().join(".grove")).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("inner"), "x").unwrap();
        fs::write(dir.path().join("b"), "b").unwrap();
        fs::write(dir.path().join("a"), "a").unwrap();

        let listed = tree.list().unwrap();
        assert_eq!(listed, vec![name("a"), name("b")]);
    }

    #[test]
    fn test_read_directory_is_absent() {
        let (dir, tree) = setup();
        fs::create_dir(dir.path().join("sub")).unwrap();
        assert_eq!(tree.read(&name("sub")).unwrap(), None);
    }
}
