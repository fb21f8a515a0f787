//! grove - a small content-addressed version control system
//!
//! Files are stored as content-addressed blobs, commits form an immutable
//! DAG, and branches are named pointers into it. Everything lives in a
//! `.grove/` directory next to the tracked files.
//!
//! # Example
//!
//! ```no_run
//! use grove::storage::{MergeOutcome, RepoConfig, Repository};
//!
//! let mut repo = Repository::init(RepoConfig::new("./project")).unwrap();
//! std::fs::write("./project/readme", "hello").unwrap();
//! repo.add("readme").unwrap();
//! repo.commit("add readme").unwrap();
//!
//! repo.create_branch("feature").unwrap();
//! if let MergeOutcome::Merged { conflicts, .. } = repo.merge("feature").unwrap() {
//!     println!("{} conflicts", conflicts.len());
//! }
//! ```

pub mod cli;
pub mod storage;
