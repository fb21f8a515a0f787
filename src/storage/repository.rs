//!   Repository handle.
//!
//!  This is the central component of the storage layer. It ties the object
//!  stores, the branch table and the staging area to a working directory and
//!  provides the high-level operations the command line uses.
//!
//! A handle is opened once per command, mutated in memory and persisted at
//! the end of each operation. Mutating operations hold the repository lock.

use std::fmt;
use std::fs;

use crate::storage::blob::BlobStore;
use crate::storage::commit::{Commit, CommitBuilder, CommitGraph, CommitInfo};
use crate::storage::config::{RepoConfig, RepoPaths};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::lock::RepoLock;
use crate::storage::refs::RefTable;
use crate::storage::staging::{RemoveOutcome, StagingArea};
use crate::storage::tree::Snapshot;
use crate::storage::types::{
    BlobId, BranchName, Change, ChangeStatus, CommitId, FileName, InvalidNameError, ObjectId,
};
use crate::storage::worktree::{FsWorkTree, WorkTree};

/// An open repository.
pub struct Repository<W: WorkTree = FsWorkTree> {
    pub(super) config: RepoConfig,
    pub(super) paths: RepoPaths,
    pub(super) blobs: BlobStore,
    pub(super) commits: CommitGraph,
    pub(super) refs: RefTable,
    pub(super) staging: StagingArea,
    pub(super) worktree: W,
    lock: Option<RepoLock>,
}

impl Repository<FsWorkTree> {
    /// Initialize a new repository in the configured working directory.
    pub fn init(config: RepoConfig) -> StorageResult<Self> {
        let worktree = FsWorkTree::new(&config.work_dir, config.repo_dir_name.clone());
        Self::init_in(config, worktree)
    }

    /// Open an existing repository for reading.
    pub fn open(config: RepoConfig) -> StorageResult<Self> {
        let worktree = FsWorkTree::new(&config.work_dir, config.repo_dir_name.clone());
        Self::open_in(config, worktree, false)
    }

    /// Open an existing repository and take the repository lock.
    pub fn open_for_write(config: RepoConfig) -> StorageResult<Self> {
        let worktree = FsWorkTree::new(&config.work_dir, config.repo_dir_name.clone());
        Self::open_in(config, worktree, true)
    }
}

impl<W: WorkTree> Repository<W> {
    /// Initialize a repository whose working files live in `worktree`.
    pub fn init_in(config: RepoConfig, worktree: W) -> StorageResult<Self> {
        let paths = config.paths();
        if paths.is_initialized() {
            return Err(StorageError::AlreadyInitialized(paths.repo_dir().to_path_buf()));
        }

        fs::create_dir_all(paths.objects_dir())?;
        fs::create_dir_all(paths.commits_dir())?;
        let lock = RepoLock::acquire(&paths.lock_file())?;

        let commits = CommitGraph::new(paths.commits_dir());
        let root = commits.append(&Commit::root())?;

        let repo = Self {
            blobs: BlobStore::new(paths.objects_dir()),
            commits,
            refs: RefTable::new(config.default_branch.clone(), root),
            staging: StagingArea::new(),
            worktree,
            lock: Some(lock),
            config,
            paths,
        };
        repo.persist()?;

        tracing::info!(
            path = %repo.paths.repo_dir().display(),
            branch = %repo.refs.active(),
            root = %root,
            "initialized repository"
        );
        Ok(repo)
    }

    /// Open an existing repository over `worktree`, optionally locking it first.
    pub fn open_in(config: RepoConfig, worktree: W, writable: bool) -> StorageResult<Self> {
        let paths = config.paths();
        if !paths.is_initialized() {
            return Err(StorageError::NotInitialized(paths.work_dir().to_path_buf()));
        }

        // lock before reading so the loaded state cannot go stale
        let lock = if writable {
            Some(RepoLock::acquire(&paths.lock_file())?)
        } else {
            None
        };

        let refs = RefTable::load(&paths)?;
        let staging = StagingArea::load(&paths)?;
        tracing::debug!(branch = %refs.active(), head = %refs.head(), "opened repository");

        Ok(Self {
            blobs: BlobStore::new(paths.objects_dir()),
            commits: CommitGraph::new(paths.commits_dir()),
            refs,
            staging,
            worktree,
            lock,
            config,
            paths,
        })
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn paths(&self) -> &RepoPaths {
        &self.paths
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn commits(&self) -> &CommitGraph {
        &self.commits
    }

    pub fn refs(&self) -> &RefTable {
        &self.refs
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn worktree(&self) -> &W {
        &self.worktree
    }

    pub fn is_locked(&self) -> bool {
        self.lock.as_ref().is_some_and(RepoLock::is_held)
    }

    /// Get the current HEAD commit (tip of the active branch).
    pub fn head(&self) -> CommitId {
        self.refs.head()
    }

    pub fn active_branch(&self) -> &BranchName {
        self.refs.active()
    }

    pub fn head_commit(&self) -> StorageResult<Commit> {
        self.stored_commit(self.refs.head())
    }

    // ==================== Staging Operations ====================

    /// Stage the working copy of `path` for the next commit.
    pub fn add(&mut self, path: &str) -> StorageResult<BlobId> {
        self.ensure_writable()?;
        let path = self.tracked_path(path)?;
        let contents = self
            .worktree
            .read(&path)?
            .ok_or_else(|| StorageError::FileNotFound(path.clone()))?;

        let id = self.blobs.put(&contents)?;
        let head = self.head_commit()?;
        self.staging.stage_add(path.clone(), id, &head.snapshot);
        self.persist()?;

        tracing::info!(file = %path, blob = %id, "staged file");
        Ok(id)
    }

    /// Unstage `path`, or stage its removal and delete the working copy.
    pub fn remove(&mut self, path: &str) -> StorageResult<RemoveOutcome> {
        self.ensure_writable()?;
        let path = self.tracked_path(path)?;
        let head = self.head_commit()?;

        let outcome = self.staging.stage_remove(&path, &head.snapshot)?;
        if outcome == RemoveOutcome::Removed {
            self.worktree.delete(&path)?;
        }
        self.persist()?;

        tracing::info!(file = %path, ?outcome, "removed file");
        Ok(outcome)
    }

    // ==================== Commit Operations ====================

    /// Record the staged changes as a new commit on the active branch.
    pub fn commit(&mut self, message: &str) -> StorageResult<CommitId> {
        self.ensure_writable()?;
        if self.staging.is_empty() {
            return Err(StorageError::NothingToCommit);
        }
        self.commit_with(message, None)
    }

    /// fold the staging area onto HEAD and advance the active branch
    ///
    /// `second_parent` makes this a merge commit; an empty stage is allowed then
    pub(super) fn commit_with(
        &mut self,
        message: &str,
        second_parent: Option<CommitId>,
    ) -> StorageResult<CommitId> {
        let parent = self.refs.head();
        let snapshot = self.staging.apply(&self.head_commit()?.snapshot);

        let mut builder = CommitBuilder::new()
            .parent(parent)
            .message(message)
            .snapshot(snapshot);
        if let Some(other) = second_parent {
            builder = builder.parent(other);
        }
        let commit = builder.build()?;

        let id = self.commits.append(&commit)?;
        self.refs.advance(id);
        self.staging.clear();
        self.persist()?;

        tracing::info!(
            commit = %id,
            branch = %self.refs.active(),
            files = commit.snapshot.len(),
            "created commit"
        );
        Ok(id)
    }

    // ==================== Checkout Operations ====================

    /// Switch to another branch, replacing the working files with its snapshot.
    pub fn checkout_branch(&mut self, name: &str) -> StorageResult<()> {
        self.ensure_writable()?;
        let target = self
            .refs
            .resolve(name)
            .ok_or_else(|| StorageError::NoSuchBranch(name.to_string()))?;
        if self.refs.active().as_str() == name {
            return Err(StorageError::AlreadyOnBranch(self.refs.active().clone()));
        }

        let snapshot = self.stored_commit(target)?.snapshot;
        self.materialize(&snapshot)?;
        self.refs.switch_to(name)?;
        self.staging.clear();
        self.persist()?;

        tracing::info!(branch = name, commit = %target, "checked out branch");
        Ok(())
    }

    /// Restore `path` from the HEAD commit.
    pub fn checkout_file(&mut self, path: &str) -> StorageResult<()> {
        let head = self.refs.head();
        self.restore_file(head, path)
    }

    /// Restore `path` from the commit named by a full id or unique prefix.
    pub fn checkout_file_from(&mut self, commit: &str, path: &str) -> StorageResult<()> {
        let id = self.commits.resolve(commit)?;
        self.restore_file(id, path)
    }

    fn restore_file(&mut self, commit: CommitId, path: &str) -> StorageResult<()> {
        self.ensure_writable()?;
        let path = self.tracked_path(path)?;
        let snapshot = self.stored_commit(commit)?.snapshot;
        let blob = snapshot
            .get(path.as_str())
            .ok_or_else(|| StorageError::FileNotInCommit(path.clone()))?;

        self.worktree.write(&path, &self.stored_blob(blob)?)?;
        tracing::info!(file = %path, commit = %commit, "restored file");
        Ok(())
    }

    /// Move the active branch to `commit` and check out its snapshot.
    pub fn reset(&mut self, commit: &str) -> StorageResult<CommitId> {
        self.ensure_writable()?;
        let id = self.commits.resolve(commit)?;
        let snapshot = self.stored_commit(id)?.snapshot;

        self.materialize(&snapshot)?;
        self.refs.advance(id);
        self.staging.clear();
        self.persist()?;

        tracing::info!(branch = %self.refs.active(), commit = %id, "reset branch");
        Ok(id)
    }

    // ==================== Branch Operations ====================

    /// Create a branch at HEAD without switching to it.
    pub fn create_branch(&mut self, name: &str) -> StorageResult<()> {
        self.ensure_writable()?;
        let branch = BranchName::new(name)?;
        let head = self.refs.head();
        self.refs.create(branch, head)?;
        self.persist()?;

        tracing::info!(branch = name, commit = %head, "created branch");
        Ok(())
    }

    /// Delete a branch pointer. Its commits are kept.
    pub fn remove_branch(&mut self, name: &str) -> StorageResult<()> {
        self.ensure_writable()?;
        self.refs.delete(name)?;
        self.persist()?;

        tracing::info!(branch = name, "removed branch");
        Ok(())
    }

    // ==================== History Operations ====================

    /// The first-parent history of HEAD, newest first.
    pub fn log(&self) -> StorageResult<Vec<CommitInfo>> {
        self.commits
            .ancestors(self.refs.head())
            .first_parent_only()
            .collect::<StorageResult<_>>()
            .map_err(|e| self.missing_object(e))
    }

    /// Every commit ever made, ordered by id.
    pub fn global_log(&self) -> StorageResult<Vec<CommitInfo>> {
        self.commits.all()
    }

    /// Ids of every commit with exactly this message, ordered by id.
    pub fn find(&self, message: &str) -> StorageResult<Vec<CommitId>> {
        let found = self.commits.find_by_message(message)?;
        if found.is_empty() {
            return Err(StorageError::NoCommitWithMessage(message.to_string()));
        }
        Ok(found)
    }

    /// Branches, staged changes and working-tree differences.
    pub fn status(&self) -> StorageResult<Status> {
        let head = self.head_commit()?.snapshot;
        let staged = self.staging.staged();
        let removed = self.staging.removed();

        let mut modified = Vec::new();
        for (path, committed) in head.iter() {
            if staged.contains_key(path) || removed.contains_key(path) {
                continue;
            }
            if let Some(status) = self.working_change(path, *committed)? {
                modified.push(Change {
                    path: path.clone(),
                    status,
                });
            }
        }
        for (path, staged_id) in staged {
            if let Some(status) = self.working_change(path, *staged_id)? {
                modified.push(Change {
                    path: path.clone(),
                    status,
                });
            }
        }
        modified.sort_by(|a, b| a.path.cmp(&b.path));

        let untracked = self
            .worktree
            .list()?
            .into_iter()
            .filter(|path| {
                !staged.contains_key(path) && (!head.contains(path.as_str()) || removed.contains_key(path))
            })
            .collect();

        Ok(Status {
            branches: self.refs.iter().map(|(name, _)| name.clone()).collect(),
            active: self.refs.active().clone(),
            staged: staged.keys().cloned().collect(),
            removed: removed.keys().cloned().collect(),
            modified,
            untracked,
        })
    }

    // ==================== Internals ====================

    /// how the working copy of `path` differs from `expected`, if at all
    fn working_change(&self, path: &FileName, expected: BlobId) -> StorageResult<Option<ChangeStatus>> {
        Ok(match self.worktree.read(path)? {
            None => Some(ChangeStatus::Deleted),
            Some(bytes) if BlobId::new(ObjectId::digest(&bytes)) != expected => {
                Some(ChangeStatus::Modified)
            }
            Some(_) => None,
        })
    }

    /// validate a user-supplied path as a tracked file name
    fn tracked_path(&self, path: &str) -> StorageResult<FileName> {
        if path == self.config.repo_dir_name {
            return Err(InvalidNameError::Reserved(path.to_string()).into());
        }
        Ok(FileName::new(path)?)
    }

    pub(super) fn ensure_writable(&mut self) -> StorageResult<()> {
        if self.lock.is_none() {
            self.lock = Some(RepoLock::acquire(&self.paths.lock_file())?);
        }
        Ok(())
    }

    /// refuse when a working file HEAD does not track is among `paths`
    pub(super) fn guard_untracked<'a>(
        &self,
        current: &Snapshot,
        paths: impl IntoIterator<Item = &'a FileName>,
    ) -> StorageResult<()> {
        let mut in_the_way = Vec::new();
        for path in paths {
            if !current.contains(path.as_str()) && self.worktree.exists(path)? {
                in_the_way.push(path.clone());
            }
        }
        if in_the_way.is_empty() {
            Ok(())
        } else {
            tracing::debug!(files = ?in_the_way, "untracked files block the operation");
            Err(StorageError::UntrackedFileConflict { paths: in_the_way })
        }
    }

    /// replace the working files tracked at HEAD with `target`
    pub(super) fn materialize(&self, target: &Snapshot) -> StorageResult<()> {
        let current = self.head_commit()?.snapshot;
        self.guard_untracked(&current, target.paths())?;

        for path in current.paths() {
            if !target.contains(path.as_str()) {
                self.worktree.delete(path)?;
            }
        }
        for (path, blob) in target {
            self.worktree.write(path, &self.stored_blob(*blob)?)?;
        }
        tracing::debug!(files = target.len(), "materialized snapshot");
        Ok(())
    }

    /// a commit reached from the branch table or another commit
    pub(super) fn stored_commit(&self, id: CommitId) -> StorageResult<Commit> {
        self.commits.get(id).map_err(|e| self.missing_object(e))
    }

    /// the contents of a blob a snapshot refers to
    pub(super) fn stored_blob(&self, id: BlobId) -> StorageResult<Vec<u8>> {
        self.blobs.get(id).map_err(|e| self.missing_object(e))
    }

    /// an object the repository's own state points at must exist
    pub(super) fn missing_object(&self, err: StorageError) -> StorageError {
        match err {
            StorageError::CommitNotFound(id) => {
                StorageError::corrupted(self.paths.commits_dir().join(id), "referenced commit is missing")
            }
            StorageError::ObjectNotFound(id) => {
                StorageError::corrupted(self.paths.objects_dir().join(id), "referenced blob is missing")
            }
            other => other,
        }
    }

    /// write the branch table, HEAD and the staging index, in that order
    pub(super) fn persist(&self) -> StorageResult<()> {
        self.refs.save(&self.paths)?;
        self.staging.save(&self.paths)?;
        Ok(())
    }
}

/// The `status` projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub branches: Vec<BranchName>,
    pub active: BranchName,
    pub staged: Vec<FileName>,
    pub removed: Vec<FileName>,
    pub modified: Vec<Change>,
    pub untracked: Vec<FileName>,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Branches ===")?;
        for branch in &self.branches {
            if *branch == self.active {
                writeln!(f, "*{}", branch)?;
            } else {
                writeln!(f, "{}", branch)?;
            }
        }
        writeln!(f)?;

        writeln!(f, "=== Staged Files ===")?;
        for path in &self.staged {
            writeln!(f, "{}", path)?;
        }
        writeln!(f)?;

        writeln!(f, "=== Removed Files ===")?;
        for path in &self.removed {
            writeln!(f, "{}", path)?;
        }
        writeln!(f)?;

        writeln!(f, "=== Modifications Not Staged For Commit ===")?;
        for change in &self.modified {
            writeln!(f, "{}", change)?;
        }
        writeln!(f)?;

        writeln!(f, "=== Untracked Files ===")?;
        for path in &self.untracked {
            writeln!(f, "{}", path)?;
        }
        writeln!(f)
    }
}
