//!  Branch and HEAD management.
//!
//!  Branches are named pointers to commits. This module handles:
//! - the branch table (`branches`)
//! - the active branch (`HEAD`)
//! - pointer updates, creation and deletion
//!
//! HEAD always names a branch; the HEAD commit is that branch's tip, so the
//! two can never disagree on disk.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use crate::storage::atomic;
use crate::storage::config::RepoPaths;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BranchName, CommitId};

/// The branch table plus the active branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefTable {
    branches: BTreeMap<BranchName, CommitId>,
    active: BranchName,
}

fn read_state_file(path: &Path) -> StorageResult<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => StorageError::corrupted(path, "missing state file"),
        _ => StorageError::Io(e),
    })
}

impl RefTable {
    /// a fresh table with a single branch pointing at `initial`
    pub fn new(active: BranchName, initial: CommitId) -> Self {
        Self {
            branches: BTreeMap::from([(active.clone(), initial)]),
            active,
        }
    }

    /// load the branch table and HEAD
    pub fn load(paths: &RepoPaths) -> StorageResult<Self> {
        let branches_file = paths.branches_file();
        let bytes = read_state_file(&branches_file)?;
        let branches: BTreeMap<BranchName, CommitId> = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::corrupted(&branches_file, e))?;

        let head_file = paths.head_file();
        let head = read_state_file(&head_file)?;
        let name = String::from_utf8(head)
            .map_err(|e| StorageError::corrupted(&head_file, e))?;
        let active = BranchName::new(name.trim_end())
            .map_err(|e| StorageError::corrupted(&head_file, e))?;

        if !branches.contains_key(&active) {
            return Err(StorageError::corrupted(
                &head_file,
                format!("HEAD names unknown branch '{}'", active),
            ));
        }

        Ok(Self { branches, active })
    }

    /// persist the branch table, then HEAD
    pub fn save(&self, paths: &RepoPaths) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(&self.branches)?;
        atomic::write_atomic(&paths.branches_file(), &bytes)?;
        atomic::write_atomic(&paths.head_file(), format!("{}\n", self.active).as_bytes())?;
        Ok(())
    }

    pub fn active(&self) -> &BranchName {
        &self.active
    }

    /// the tip of the active branch
    pub fn head(&self) -> CommitId {
        // load() and every mutator keep the active branch in the table
        self.branches[&self.active]
    }

    /// Resolve a branch name to its current commit ID.
    pub fn resolve(&self, name: &str) -> Option<CommitId> {
        self.branches.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.branches.contains_key(name)
    }

    /// all branches in name order
    pub fn iter(&self) -> impl Iterator<Item = (&BranchName, &CommitId)> {
        self.branches.iter()
    }

    /// Create a new branch pointing to the given commit.
    pub fn create(&mut self, name: BranchName, target: CommitId) -> StorageResult<()> {
        if self.branches.contains_key(&name) {
            return Err(StorageError::BranchExists(name));
        }
        self.branches.insert(name, target);
        Ok(())
    }

    /// Delete a branch pointer. The commits it pointed at are kept.
    pub fn delete(&mut self, name: &str) -> StorageResult<()> {
        if !self.branches.contains_key(name) {
            return Err(StorageError::BranchNotFound(name.to_string()));
        }
        if self.active.as_str() == name {
            return Err(StorageError::CannotRemoveActiveBranch(self.active.clone()));
        }
        self.branches.remove(name);
        Ok(())
    }

    /// make `name` the active branch
    pub fn switch_to(&mut self, name: &str) -> StorageResult<()> {
        match self.branches.get_key_value(name) {
            Some((branch, _)) => {
                self.active = branch.clone();
                Ok(())
            }
            None => Err(StorageError::NoSuchBranch(name.to_string())),
        }
    }

    /// move the active branch to `target`
    pub fn advance(&mut self, target: CommitId) {
        self.branches.insert(self.active.clone(), target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::config::RepoConfig;
    use crate::storage::types::ObjectId;
    use tempfile::TempDir;

    fn commit(seed: &[u8]) -> CommitId {
        CommitId::new(ObjectId::digest(seed))
    }

    fn setup() -> (TempDir, RepoPaths) {
        let dir = TempDir::new().unwrap();
        let paths = RepoConfig::new(dir.path()).paths();
        fs::create_dir_all(paths.repo_dir()).unwrap();
        (dir, paths)
    }

    #[test]
    fn test_new_table() {
        let table = RefTable::new(BranchName::default_branch(), commit(b"root"));
        assert_eq!(table.active().as_str(), "master");
        assert_eq!(table.head(), commit(b"root"));
        assert_eq!(table.resolve("master"), Some(commit(b"root")));
    }

    #[test]
    fn test_branch_lifecycle() {
        let mut table = RefTable::new(BranchName::default_branch(), commit(b"root"));
        let feature = BranchName::new("feature").unwrap();

        table.create(feature.clone(), commit(b"root")).unwrap();
        assert!(table.contains("feature"));

        let dup = table.create(feature, commit(b"other"));
        assert!(matches!(dup, Err(StorageError::BranchExists(_))));

        table.delete("feature").unwrap();
        assert!(!table.contains("feature"));
        assert!(matches!(
            table.delete("feature"),
            Err(StorageError::BranchNotFound(_))
        ));
    }

    #[test]
    fn test_cannot_delete_active() {
        let mut table = RefTable::new(BranchName::default_branch(), commit(b"root"));
        assert!(matches!(
            table.delete("master"),
            Err(StorageError::CannotRemoveActiveBranch(_))
        ));
    }

    #[test]
    fn test_switch_and_advance() {
        let mut table = RefTable::new(BranchName::default_branch(), commit(b"root"));
        table
            .create(BranchName::new("dev").unwrap(), commit(b"root"))
            .unwrap();

        table.switch_to("dev").unwrap();
        table.advance(commit(b"next"));

        assert_eq!(table.head(), commit(b"next"));
        assert_eq!(table.resolve("master"), Some(commit(b"root")));
        assert!(matches!(
            table.switch_to("ghost"),
            Err(StorageError::NoSuchBranch(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let (_dir, paths) = setup();
        let mut table = RefTable::new(BranchName::default_branch(), commit(b"root"));
        table
            .create(BranchName::new("dev").unwrap(), commit(b"dev"))
            .unwrap();
        table.switch_to("dev").unwrap();
        table.save(&paths).unwrap();

        let loaded = RefTable::load(&paths).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_load_missing_is_corruption() {
        let (_dir, paths) = setup();
        assert!(matches!(
            RefTable::load(&paths),
            Err(StorageError::CorruptedState { .. })
        ));
    }

    #[test]
    fn test_load_dangling_head() {
        let (_dir, paths) = setup();
        RefTable::new(BranchName::default_branch(), commit(b"root"))
            .save(&paths)
            .unwrap();
        fs::write(paths.head_file(), "ghost\n").unwrap();

        assert!(matches!(
            RefTable::load(&paths),
            Err(StorageError::CorruptedState { .. })
        ));
    }
}
