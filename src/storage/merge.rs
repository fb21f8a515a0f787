//! Three-way merge of another branch into the active branch.
//!
//! The split point is the lowest common ancestor of the two tips. Every path
//! is classified by comparing its blob at the split point with the current
//! and given tips; paths changed on both sides in different ways become
//! conflicts, written out with markers and committed like any other change.

use crate::storage::commit::CommitMessage;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::repository::Repository;
use crate::storage::tree::Snapshot;
use crate::storage::types::{BlobId, BranchName, CommitId, FileName};
use crate::storage::worktree::WorkTree;

/// how a merge finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// the given branch is already contained in the active branch
    AlreadyUpToDate,
    /// the active branch was moved forward to the given tip
    FastForwarded(CommitId),
    /// a merge commit was created; `conflicts` lists files with markers
    Merged {
        commit: CommitId,
        conflicts: Vec<FileName>,
    },
}

impl MergeOutcome {
    pub fn has_conflicts(&self) -> bool {
        matches!(self, MergeOutcome::Merged { conflicts, .. } if !conflicts.is_empty())
    }
}

/// what the merge does to a single path
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    Take(BlobId),
    Delete,
    Conflict {
        current: Option<BlobId>,
        given: Option<BlobId>,
    },
}

/// decide a single path from its blob at the split point, current and given tips
fn resolve(split: Option<BlobId>, current: Option<BlobId>, given: Option<BlobId>) -> Option<Resolution> {
    if given == split || current == given {
        return None;
    }
    if current == split {
        return Some(match given {
            Some(id) => Resolution::Take(id),
            None => Resolution::Delete,
        });
    }
    Some(Resolution::Conflict { current, given })
}

/// the contents written for a conflicted file
pub fn conflict_contents(current: &[u8], given: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(current.len() + given.len() + 32);
    out.extend_from_slice(b"<<<<<<< HEAD\n");
    out.extend_from_slice(current);
    out.extend_from_slice(b"=======\n");
    out.extend_from_slice(given);
    out.extend_from_slice(b">>>>>>>\n");
    out
}

/// classify every path that appears in any of the three snapshots
fn plan(split: &Snapshot, current: &Snapshot, given: &Snapshot) -> Vec<(FileName, Resolution)> {
    Snapshot::union_paths(&[split, current, given])
        .into_iter()
        .filter_map(|path| {
            let key = path.as_str();
            resolve(split.get(key), current.get(key), given.get(key))
                .map(|resolution| (path.clone(), resolution))
        })
        .collect()
}

impl<W: WorkTree> Repository<W> {
    /// Merge the branch `given` into the active branch.
    pub fn merge(&mut self, given: &str) -> StorageResult<MergeOutcome> {
        self.ensure_writable()?;
        if self.refs.active().as_str() == given {
            return Err(StorageError::SelfMerge);
        }
        if !self.staging.is_empty() {
            return Err(StorageError::UncommittedChanges);
        }
        let given_tip = self
            .refs
            .resolve(given)
            .ok_or_else(|| StorageError::BranchNotFound(given.to_string()))?;
        let given_name = BranchName::new(given)?;
        let current_tip = self.refs.head();

        let split = self
            .commits
            .lowest_common_ancestor(current_tip, given_tip)
            .map_err(|e| self.missing_object(e))?;
        tracing::debug!(current = %current_tip, given = %given_tip, split = %split, "found split point");

        if split == given_tip {
            tracing::info!(branch = given, "given branch is already merged");
            return Ok(MergeOutcome::AlreadyUpToDate);
        }

        if split == current_tip {
            let target = self.stored_commit(given_tip)?.snapshot;
            self.materialize(&target)?;
            self.refs.advance(given_tip);
            self.staging.clear();
            self.persist()?;
            tracing::info!(branch = %self.refs.active(), commit = %given_tip, "fast-forwarded");
            return Ok(MergeOutcome::FastForwarded(given_tip));
        }

        let split_snapshot = self.stored_commit(split)?.snapshot;
        let current = self.stored_commit(current_tip)?.snapshot;
        let incoming = self.stored_commit(given_tip)?.snapshot;

        let resolutions = plan(&split_snapshot, &current, &incoming);
        // nothing is written until every touched path is known to be safe
        self.guard_untracked(&current, resolutions.iter().map(|(path, _)| path))?;

        let mut conflicts = Vec::new();
        for (path, resolution) in resolutions {
            match resolution {
                Resolution::Take(id) => {
                    self.worktree.write(&path, &self.stored_blob(id)?)?;
                    self.staging.stage_add(path, id, &current);
                }
                Resolution::Delete => {
                    self.staging.stage_remove(&path, &current)?;
                    self.worktree.delete(&path)?;
                }
                Resolution::Conflict { current: ours, given: theirs } => {
                    let ours = self.read_blob(ours)?;
                    let theirs = self.read_blob(theirs)?;
                    let contents = conflict_contents(&ours, &theirs);
                    let id = self.blobs.put(&contents)?;
                    self.worktree.write(&path, &contents)?;
                    self.staging.stage_add(path.clone(), id, &current);
                    tracing::info!(file = %path, "merge conflict");
                    conflicts.push(path);
                }
            }
        }

        let message = CommitMessage::merged(&given_name, self.refs.active());
        let commit = self.commit_with(&message, Some(given_tip))?;
        tracing::info!(commit = %commit, conflicts = conflicts.len(), "merged branch {}", given);

        Ok(MergeOutcome::Merged { commit, conflicts })
    }

    fn read_blob(&self, id: Option<BlobId>) -> StorageResult<Vec<u8>> {
        match id {
            Some(id) => self.stored_blob(id),
            None => Ok(Vec::new()),
        }
    }
}
