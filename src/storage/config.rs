//! Repository configuration and on-disk layout.

use std::path::{Path, PathBuf};

use crate::storage::types::BranchName;

/// default name of the repository directory inside the working directory
pub const DEFAULT_REPO_DIR: &str = ".grove";

/// Repository configuration options.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// The working directory whose files are tracked.
    pub work_dir: PathBuf,
    /// Name of the repository directory inside `work_dir`.
    pub repo_dir_name: String,
    /// Branch created by `init`.
    pub default_branch: BranchName,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            repo_dir_name: DEFAULT_REPO_DIR.to_string(),
            default_branch: BranchName::default_branch(),
        }
    }
}

impl RepoConfig {
    /// Create a new configuration for the given working directory.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Default::default()
        }
    }

    /// Set the repository directory name.
    pub fn repo_dir_name(mut self, name: impl Into<String>) -> Self {
        self.repo_dir_name = name.into();
        self
    }

    /// Set the branch created by `init`.
    pub fn default_branch(mut self, branch: BranchName) -> Self {
        self.default_branch = branch;
        self
    }

    pub fn paths(&self) -> RepoPaths {
        RepoPaths::new(&self.work_dir, &self.repo_dir_name)
    }
}

/// Every path the repository reads or writes.
///
/// ```text
/// <work_dir>/.grove/
///   objects/     content-addressed blobs
///   commits/     content-addressed commits
///   branches     branch table
///   HEAD         active branch name
///   index        staging area
///   lock         exclusive lock for mutating commands
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPaths {
    work_dir: PathBuf,
    repo_dir: PathBuf,
}

impl RepoPaths {
    pub fn new(work_dir: &Path, repo_dir_name: &str) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            repo_dir: work_dir.join(repo_dir_name),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// the root marker directory; its presence means the repository is initialized
    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.repo_dir.join("objects")
    }

    pub fn commits_dir(&self) -> PathBuf {
        self.repo_dir.join("commits")
    }

    pub fn branches_file(&self) -> PathBuf {
        self.repo_dir.join("branches")
    }

    pub fn head_file(&self) -> PathBuf {
        self.repo_dir.join("HEAD")
    }

    pub fn index_file(&self) -> PathBuf {
        self.repo_dir.join("index")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.repo_dir.join("lock")
    }

    pub fn is_initialized(&self) -> bool {
        self.repo_dir.is_dir()
    }
}
