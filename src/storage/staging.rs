//! The staging area.
//!
//! Pending additions and removals are kept in two maps that never share a
//! key. Both maps are persisted together in a single `index` record, so a
//! crash can never leave them overlapping.

use std::collections::BTreeMap;
use std::fs;
use std::io;

use serde::{Deserialize, Serialize};

use crate::storage::atomic;
use crate::storage::config::RepoPaths;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::tree::Snapshot;
use crate::storage::types::{BlobId, FileName};

/// what `stage_remove` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// the path was only staged for addition; it is now unstaged
    Unstaged,
    /// the tracked path is staged for removal; the working file should go
    Removed,
}

/// pending changes for the next commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingArea {
    to_add: BTreeMap<FileName, BlobId>,
    to_remove: BTreeMap<FileName, BlobId>,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(paths: &RepoPaths) -> StorageResult<Self> {
        let path = paths.index_file();
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::corrupted(&path, "missing state file"),
            _ => StorageError::Io(e),
        })?;
        let staging: StagingArea =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::corrupted(&path, e))?;

        if let Some(path_in_both) = staging.to_add.keys().find(|p| staging.to_remove.contains_key(*p)) {
            return Err(StorageError::corrupted(
                &path,
                format!("'{}' is staged for both addition and removal", path_in_both),
            ));
        }
        Ok(staging)
    }

    pub fn save(&self, paths: &RepoPaths) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        atomic::write_atomic(&paths.index_file(), &bytes)?;
        Ok(())
    }

    /// stage `path` with content `id`, relative to the HEAD snapshot
    ///
    /// content identical to HEAD leaves nothing staged for the path
    pub fn stage_add(&mut self, path: FileName, id: BlobId, head: &Snapshot) {
        self.to_remove.remove(&path);
        if head.get(path.as_str()) == Some(id) {
            self.to_add.remove(&path);
        } else {
            self.to_add.insert(path, id);
        }
    }

    /// stage the removal of `path`
    pub fn stage_remove(&mut self, path: &FileName, head: &Snapshot) -> StorageResult<RemoveOutcome> {
        if self.to_add.remove(path).is_some() {
            return Ok(RemoveOutcome::Unstaged);
        }
        match head.get(path.as_str()) {
            Some(id) => {
                self.to_remove.insert(path.clone(), id);
                Ok(RemoveOutcome::Removed)
            }
            None => Err(StorageError::NothingToRemove(path.clone())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    pub fn clear(&mut self) {
        self.to_add.clear();
        self.to_remove.clear();
    }

    /// files staged for addition, in name order
    pub fn staged(&self) -> &BTreeMap<FileName, BlobId> {
        &self.to_add
    }

    /// files staged for removal, in name order
    pub fn removed(&self) -> &BTreeMap<FileName, BlobId> {
        &self.to_remove
    }

    /// fold the pending changes onto `base`
    pub fn apply(&self, base: &Snapshot) -> Snapshot {
        let mut snapshot = base.clone();
        for (path, id) in &self.to_add {
            snapshot.insert(path.clone(), *id);
        }
        for path in self.to_remove.keys() {
            snapshot.remove(path.as_str());
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::config::RepoConfig;
    use crate::storage::types::ObjectId;
    use tempfile::TempDir;

    fn blob(content: &[u8]) -> BlobId {
        BlobId::new(ObjectId::digest(content))
    }

    fn name(s: &str) -> FileName {
        FileName::new(s).unwrap()
    }

    fn head_with(path: &str, content: &[u8]) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert(name(path), blob(content));
        snapshot
    }

    #[test]
    fn test_stage_new_file() {
        let mut staging = StagingArea::new();
        staging.stage_add(name("f"), blob(b"A"), &Snapshot::new());

        assert!(!staging.is_empty());
        assert_eq!(staging.staged().get("f"), Some(&blob(b"A")));
    }

    #[test]
    fn test_stage_unchanged_file_is_noop() {
        let head = head_with("f", b"A");
        let mut staging = StagingArea::new();

        staging.stage_add(name("f"), blob(b"B"), &head);
        assert!(!staging.is_empty());

        // reverting to the committed content unstages it
        staging.stage_add(name("f"), blob(b"A"), &head);
        assert!(staging.is_empty());
    }

    #[test]
    fn test_stage_add_is_idempotent() {
        let mut once = StagingArea::new();
        once.stage_add(name("f"), blob(b"A"), &Snapshot::new());
        let mut twice = once.clone();
        twice.stage_add(name("f"), blob(b"A"), &Snapshot::new());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_add_clears_pending_removal() {
        let head = head_with("f", b"A");
        let mut staging = StagingArea::new();

        assert_eq!(
            staging.stage_remove(&name("f"), &head).unwrap(),
            RemoveOutcome::Removed
        );
        assert!(staging.removed().contains_key("f"));

        staging.stage_add(name("f"), blob(b"A"), &head);
        assert!(staging.is_empty());
    }

    #[test]
    fn test_remove_unstages_addition() {
        let mut staging = StagingArea::new();
        staging.stage_add(name("new"), blob(b"x"), &Snapshot::new());

        let outcome = staging.stage_remove(&name("new"), &Snapshot::new()).unwrap();
        assert_eq!(outcome, RemoveOutcome::Unstaged);
        assert!(staging.is_empty());
    }

    #[test]
    fn test_remove_untracked_fails() {
        let mut staging = StagingArea::new();
        let result = staging.stage_remove(&name("ghost"), &Snapshot::new());
        assert!(matches!(result, Err(StorageError::NothingToRemove(_))));
    }

    #[test]
    fn test_apply() {
        let mut head = head_with("keep", b"k");
        head.insert(name("gone"), blob(b"g"));
        head.insert(name("edit"), blob(b"old"));

        let mut staging = StagingArea::new();
        staging.stage_add(name("edit"), blob(b"new"), &head);
        staging.stage_add(name("added"), blob(b"a"), &head);
        staging.stage_remove(&name("gone"), &head).unwrap();

        let next = staging.apply(&head);
        assert_eq!(next.get("keep"), Some(blob(b"k")));
        assert_eq!(next.get("edit"), Some(blob(b"new")));
        assert_eq!(next.get("added"), Some(blob(b"a")));
        assert!(!next.contains("gone"));
    }

    #[test]
    fn test_save_load_and_clear() {
        let dir = TempDir::new().unwrap();
        let paths = RepoConfig::new(dir.path()).paths();
        fs::create_dir_all(paths.repo_dir()).unwrap();

        let mut staging = StagingArea::new();
        staging.stage_add(name("f"), blob(b"A"), &Snapshot::new());
        staging.save(&paths).unwrap();
        assert_eq!(StagingArea::load(&paths).unwrap(), staging);

        staging.clear();
        assert!(staging.is_empty());
    }

    #[test]
    fn test_load_overlapping_maps_is_corruption() {
        let dir = TempDir::new().unwrap();
        let paths = RepoConfig::new(dir.path()).paths();
        fs::create_dir_all(paths.repo_dir()).unwrap();

        let id = blob(b"A");
        let json = format!(
            r#"{{"to_add":{{"f":"{id}"}},"to_remove":{{"f":"{id}"}}}}"#,
            id = id.to_hex()
        );
        fs::write(paths.index_file(), json).unwrap();

        assert!(matches!(
            StagingArea::load(&paths),
            Err(StorageError::CorruptedState { .. })
        ));
    }
}
