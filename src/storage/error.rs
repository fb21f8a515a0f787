//! Storage layer error types
//!
//! Every failure a repository operation can report is defined here.
//! We use `thiserror`; each variant's message is what the user sees.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::types::{BranchName, FileName, InvalidNameError};

/// the main error type for repository operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// repo is not initialized
    #[error("Not in an initialized grove directory.")]
    NotInitialized(PathBuf),

    /// `init` ran inside an existing repository
    #[error("A grove version-control system already exists in the current directory.")]
    AlreadyInitialized(PathBuf),

    /// a state file is missing or unreadable
    #[error("corrupted repository state at {path}: {reason}")]
    CorruptedState { path: PathBuf, reason: String },

    /// another process holds the repository lock
    #[error("repository is locked by another grove process")]
    RepositoryLocked,

    /// invalid file or branch name
    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// the file is not present in the working directory
    #[error("File does not exist.")]
    FileNotFound(FileName),

    /// the file is not tracked by the requested commit
    #[error("File does not exist in that commit.")]
    FileNotInCommit(FileName),

    /// a blob referenced by a snapshot is missing from the object store
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// the commit was not found
    #[error("No commit with that id exists.")]
    CommitNotFound(String),

    /// a commit id prefix matched more than one commit
    #[error("Commit id {0} is ambiguous.")]
    AmbiguousCommitId(String),

    /// no commit carries the requested message
    #[error("Found no commit with that message.")]
    NoCommitWithMessage(String),

    /// checkout target branch does not exist
    #[error("No such branch exists.")]
    NoSuchBranch(String),

    /// branch removal or merge target does not exist
    #[error("A branch with that name does not exist.")]
    BranchNotFound(String),

    /// branch already exists
    #[error("A branch with that name already exists.")]
    BranchExists(BranchName),

    #[error("No need to checkout the current branch.")]
    AlreadyOnBranch(BranchName),

    #[error("Cannot remove the current branch.")]
    CannotRemoveActiveBranch(BranchName),

    #[error("No changes added to the commit.")]
    NothingToCommit,

    #[error("Please enter a commit message.")]
    EmptyMessage,

    #[error("No reason to remove the file.")]
    NothingToRemove(FileName),

    /// a working file not tracked at HEAD would be overwritten or deleted
    #[error("There is an untracked file in the way; delete it, or add and commit it first.")]
    UntrackedFileConflict { paths: Vec<FileName> },

    #[error("Cannot merge a branch with itself.")]
    SelfMerge,

    #[error("You have uncommitted changes.")]
    UncommittedChanges,

    /// the two commits share no history (malformed graph)
    #[error("no common ancestor between {0} and {1}")]
    NoCommonAncestor(String, String),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::FileNotFound(_)
                | StorageError::FileNotInCommit(_)
                | StorageError::ObjectNotFound(_)
                | StorageError::CommitNotFound(_)
                | StorageError::AmbiguousCommitId(_)
                | StorageError::NoCommitWithMessage(_)
                | StorageError::NoSuchBranch(_)
                | StorageError::BranchNotFound(_)
        )
    }

    /// check if this error is a refused precondition
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            StorageError::NothingToCommit
                | StorageError::EmptyMessage
                | StorageError::NothingToRemove(_)
                | StorageError::AlreadyOnBranch(_)
                | StorageError::BranchExists(_)
                | StorageError::CannotRemoveActiveBranch(_)
                | StorageError::UntrackedFileConflict { .. }
                | StorageError::SelfMerge
                | StorageError::UncommittedChanges
        )
    }

    /// check if this error concerns the repository lifecycle or its durable state
    pub fn is_state(&self) -> bool {
        matches!(
            self,
            StorageError::NotInitialized(_)
                | StorageError::AlreadyInitialized(_)
                | StorageError::CorruptedState { .. }
                | StorageError::RepositoryLocked
                | StorageError::NoCommonAncestor(..)
        )
    }

    pub(crate) fn corrupted(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        StorageError::CorruptedState {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
