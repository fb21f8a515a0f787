//! storage layer for grove
//!
//! this module owns everything under the repository directory: objects,
//! commits, branches, HEAD and the staging index. The command line front end
//! uses this API and never touches the repository files directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Repository                           │
//! │   (add, rm, commit, checkout, reset, branch, log, merge)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌──────────────┬──────┴───────┬──────────────┐
//!        │              │              │              │
//!        ▼              ▼              ▼              ▼
//!  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐
//!  │   refs    │  │  staging  │  │ worktree  │  │   lock    │
//!  │ (HEAD and │  │  (index)  │  │ (working  │  │ (single   │
//!  │ branches) │  │           │  │   files)  │  │  writer)  │
//!  └───────────┘  └───────────┘  └───────────┘  └───────────┘
//!        │              │
//!        ▼              ▼
//!  ┌───────────┐  ┌───────────┐
//!  │  commit   │─▶│   blob    │
//!  │ (history) │  │ (content) │
//!  └───────────┘  └───────────┘
//!  ```
//!
//! # Usage
//!
//! ```no_run
//! use grove::storage::{RepoConfig, Repository};
//!
//! let mut repo = Repository::init(RepoConfig::new("./project"))?;
//! std::fs::write("./project/notes.txt", "hello")?;
//! repo.add("notes.txt")?;
//! let head = repo.commit("add notes")?;
//!
//! repo.create_branch("feature")?;
//! repo.checkout_branch("feature")?;
//! # let _ = head;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod atomic;
mod blob;
mod commit;
mod config;
mod error;
mod lock;
mod merge;
mod refs;
mod repository;
mod staging;
mod tree;
mod types;
mod worktree;

// Re-export public API
pub use blob::BlobStore;
pub use commit::{Ancestors, Commit, CommitBuilder, CommitGraph, CommitInfo, CommitMessage};
pub use config::{RepoConfig, RepoPaths, DEFAULT_REPO_DIR};
pub use error::{StorageError, StorageResult};
pub use lock::RepoLock;
pub use merge::{conflict_contents, MergeOutcome};
pub use refs::RefTable;
pub use repository::{Repository, Status};
pub use staging::{RemoveOutcome, StagingArea};
pub use tree::Snapshot;
pub use types::{
    BlobId, BranchName, Change, ChangeStatus, CommitId, FileName, InvalidNameError, ObjectId,
};
pub use worktree::{FsWorkTree, WorkTree};
