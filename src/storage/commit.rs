//!  Commit creation and history traversal
//!
//!  commits are immutable nodes of the history DAG:
//! - each commit records its full snapshot and 0-2 parents
//! - a commit's id is the digest of its encoded form, so it is stored once
//! - merging branches requires commit ancestry analysis
//!
//! this module handles commit encoding, the on-disk commit graph, history
//! walking and common-ancestor search

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::atomic;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::tree::Snapshot;
use crate::storage::types::{BranchName, CommitId, ObjectId};

/// a commit record, exactly as it is encoded and hashed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub parent_ids: Vec<CommitId>,
    pub snapshot: Snapshot,
}

impl Commit {
    /// the parentless commit every repository starts from
    pub fn root() -> Self {
        Self {
            message: CommitMessage::ROOT.to_string(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            parent_ids: Vec::new(),
            snapshot: Snapshot::new(),
        }
    }

    /// check if this is a merge commit (has multiple parents)
    pub fn is_merge(&self) -> bool {
        self.parent_ids.len() > 1
    }

    /// get the first (or only) parent
    pub fn first_parent(&self) -> Option<CommitId> {
        self.parent_ids.first().copied()
    }

    pub(crate) fn encode(&self) -> StorageResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// the content-derived id this commit is stored under
    pub fn id(&self) -> StorageResult<CommitId> {
        Ok(CommitId::new(ObjectId::digest(&self.encode()?)))
    }
}

/// builder for new commits
#[derive(Debug, Default)]
pub struct CommitBuilder {
    parents: Vec<CommitId>,
    message: String,
    snapshot: Snapshot,
    timestamp: Option<DateTime<Utc>>,
}

impl CommitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// add a parent commit
    pub fn parent(mut self, parent: CommitId) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// pin the timestamp (defaults to now)
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// validate and produce the commit record
    pub fn build(self) -> StorageResult<Commit> {
        if self.message.trim().is_empty() {
            return Err(StorageError::EmptyMessage);
        }
        Ok(Commit {
            message: self.message,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            parent_ids: self.parents,
            snapshot: self.snapshot,
        })
    }
}

/// a commit together with the id it is stored under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: CommitId,
    pub commit: Commit,
}

impl CommitInfo {
    /// the timestamp in the `log` date format, local time
    pub fn date(&self) -> String {
        self.commit
            .timestamp
            .with_timezone(&Local)
            .format("%a %b %d %H:%M:%S %Y %z")
            .to_string()
    }
}

/// renders one `log` entry
impl fmt::Display for CommitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===")?;
        writeln!(f, "commit {}", self.id)?;
        if self.commit.is_merge() {
            let parents: Vec<String> = self.commit.parent_ids.iter().map(|p| p.short()).collect();
            writeln!(f, "Merge: {}", parents.join(" "))?;
        }
        writeln!(f, "Date: {}", self.date())?;
        writeln!(f, "{}", self.commit.message)
    }
}

/// The on-disk commit store and the DAG queries over it.
#[derive(Debug, Clone)]
pub struct CommitGraph {
    dir: PathBuf,
}

impl CommitGraph {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, id: CommitId) -> PathBuf {
        self.dir.join(id.to_hex())
    }

    /// store a commit under its content-derived id
    pub fn append(&self, commit: &Commit) -> StorageResult<CommitId> {
        let bytes = commit.encode()?;
        let id = CommitId::new(ObjectId::digest(&bytes));
        if atomic::write_if_absent(&self.path_of(id), &bytes)? {
            tracing::debug!(commit = %id, parents = commit.parent_ids.len(), "stored commit");
        }
        Ok(id)
    }

    /// get a commit by its full id
    pub fn get(&self, id: CommitId) -> StorageResult<Commit> {
        let path = self.path_of(id);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::CommitNotFound(id.to_hex()),
            _ => StorageError::Io(e),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::corrupted(path, e))
    }

    pub fn info(&self, id: CommitId) -> StorageResult<CommitInfo> {
        Ok(CommitInfo {
            id,
            commit: self.get(id)?,
        })
    }

    pub fn contains(&self, id: CommitId) -> bool {
        self.path_of(id).is_file()
    }

    /// every stored commit id, sorted
    pub fn ids(&self) -> StorageResult<Vec<CommitId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            // temp files from an interrupted write are not commits
            if let Some(id) = name.to_str().and_then(|n| CommitId::from_hex(n).ok()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// every stored commit, sorted by id
    pub fn all(&self) -> StorageResult<Vec<CommitInfo>> {
        self.ids()?.into_iter().map(|id| self.info(id)).collect()
    }

    /// resolve a full id or a unique id prefix
    pub fn resolve(&self, text: &str) -> StorageResult<CommitId> {
        let prefix = text.trim().to_ascii_lowercase();
        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StorageError::CommitNotFound(text.to_string()));
        }

        if let Ok(id) = CommitId::from_hex(&prefix) {
            return if self.contains(id) {
                Ok(id)
            } else {
                Err(StorageError::CommitNotFound(text.to_string()))
            };
        }

        let mut matches = self
            .ids()?
            .into_iter()
            .filter(|id| id.to_hex().starts_with(&prefix));

        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id),
            (None, _) => Err(StorageError::CommitNotFound(text.to_string())),
            (Some(_), Some(_)) => Err(StorageError::AmbiguousCommitId(text.to_string())),
        }
    }

    /// ids of every commit whose message is exactly `message`
    pub fn find_by_message(&self, message: &str) -> StorageResult<Vec<CommitId>> {
        let mut found = Vec::new();
        for info in self.all()? {
            if info.commit.message == message {
                found.push(info.id);
            }
        }
        Ok(found)
    }

    /// breadth-first walk over every ancestor of `start`, including `start`
    pub fn ancestors(&self, start: CommitId) -> Ancestors<'_> {
        Ancestors::new(self, start)
    }

    /// find the lowest common ancestor of two commits
    ///
    /// the common ancestors are those reachable from both tips over every
    /// parent; the lowest are the ones no other common ancestor descends
    /// from. ties go to the one `a` reaches first, so a tip that is an
    /// ancestor of the other always wins
    pub fn lowest_common_ancestor(&self, a: CommitId, b: CommitId) -> StorageResult<CommitId> {
        if a == b {
            return Ok(a);
        }

        let from_b = self
            .ancestors(b)
            .map(|info| info.map(|info| info.id))
            .collect::<StorageResult<HashSet<_>>>()?;
        let mut common = Vec::new();
        for info in self.ancestors(a) {
            let id = info?.id;
            if from_b.contains(&id) {
                common.push(id);
            }
        }

        let below = self.proper_ancestors(&common)?;
        let lowest = common.into_iter().find(|id| !below.contains(id));
        tracing::trace!(a = %a, b = %b, lowest = ?lowest, "common ancestor search");
        lowest.ok_or_else(|| StorageError::NoCommonAncestor(a.to_hex(), b.to_hex()))
    }

    /// every commit strictly behind one of `ids`
    fn proper_ancestors(&self, ids: &[CommitId]) -> StorageResult<HashSet<CommitId>> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<CommitId> = ids.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            for parent in self.get(id)?.parent_ids {
                if seen.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        Ok(seen)
    }
}

/// lazy breadth-first history iterator
///
/// yields each reachable commit once; clone it to restart from the same point
#[derive(Clone)]
pub struct Ancestors<'g> {
    graph: &'g CommitGraph,
    queue: VecDeque<CommitId>,
    seen: HashSet<CommitId>,
    first_parent_only: bool,
}

impl<'g> Ancestors<'g> {
    fn new(graph: &'g CommitGraph, start: CommitId) -> Self {
        Self {
            graph,
            queue: VecDeque::from([start]),
            seen: HashSet::from([start]),
            first_parent_only: false,
        }
    }

    /// only follow first parents (the branch's own line through merges)
    pub fn first_parent_only(mut self) -> Self {
        self.first_parent_only = true;
        self
    }
}

impl Iterator for Ancestors<'_> {
    type Item = StorageResult<CommitInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.queue.pop_front()?;
        let commit = match self.graph.get(id) {
            Ok(commit) => commit,
            Err(e) => {
                self.queue.clear();
                return Some(Err(e));
            }
        };

        let parents = if self.first_parent_only {
            &commit.parent_ids[..commit.parent_ids.len().min(1)]
        } else {
            &commit.parent_ids[..]
        };
        for parent in parents {
            if self.seen.insert(*parent) {
                self.queue.push_back(*parent);
            }
        }

        Some(Ok(CommitInfo { id, commit }))
    }
}

/// message formatting for generated commits
pub struct CommitMessage;

impl CommitMessage {
    /// message of the root commit
    pub const ROOT: &'static str = "initial commit";

    /// message of a merge commit
    pub fn merged(given: &BranchName, active: &BranchName) -> String {
        format!("Merged {} into {}.", given, active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::{BlobId, FileName};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn setup_graph() -> (TempDir, CommitGraph, CommitId) {
        let dir = TempDir::new().unwrap();
        let graph = CommitGraph::new(dir.path());
        let root = graph.append(&Commit::root()).unwrap();
        (dir, graph, root)
    }

    fn child(graph: &CommitGraph, parents: &[CommitId], message: &str) -> CommitId {
        let mut builder = CommitBuilder::new().message(message);
        for parent in parents {
            builder = builder.parent(*parent);
        }
        graph.append(&builder.build().unwrap()).unwrap()
    }

    #[test]
    fn test_root_commit_is_deterministic() {
        let root = Commit::root();
        assert!(root.parent_ids.is_empty());
        assert_eq!(root.message, "initial commit");
        assert_eq!(root.timestamp.timestamp(), 0);
        assert_eq!(root.id().unwrap(), Commit::root().id().unwrap());
    }

    #[test]
    fn test_append_and_get() {
        let (_dir, graph, root) = setup_graph();
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            FileName::new("f.txt").unwrap(),
            BlobId::new(ObjectId::digest(b"A")),
        );
        let commit = CommitBuilder::new()
            .parent(root)
            .message("c1")
            .snapshot(snapshot.clone())
            .build()
            .unwrap();

        let id = graph.append(&commit).unwrap();
        assert_eq!(id, commit.id().unwrap());

        let loaded = graph.get(id).unwrap();
        assert_eq!(loaded, commit);
        assert_eq!(loaded.snapshot, snapshot);
        assert_eq!(loaded.first_parent(), Some(root));
    }

    #[test]
    fn test_append_dedups() {
        let (_dir, graph, root) = setup_graph();
        assert_eq!(graph.append(&Commit::root()).unwrap(), root);
        assert_eq!(graph.ids().unwrap().len(), 1);
    }

    #[test]
    fn test_builder_rejects_blank_message() {
        let result = CommitBuilder::new().message("   ").build();
        assert!(matches!(result, Err(StorageError::EmptyMessage)));
    }

    #[test]
    fn test_get_missing_commit() {
        let (_dir, graph, _root) = setup_graph();
        let missing = CommitId::new(ObjectId::digest(b"nope"));
        assert!(matches!(graph.get(missing), Err(StorageError::CommitNotFound(_))));
    }

    #[test]
    fn test_resolve_prefix() {
        let (_dir, graph, root) = setup_graph();
        let c1 = child(&graph, &[root], "c1");

        assert_eq!(graph.resolve(&c1.to_hex()).unwrap(), c1);
        assert_eq!(graph.resolve(&c1.to_hex()[..12]).unwrap(), c1);
        assert!(matches!(graph.resolve("xyz"), Err(StorageError::CommitNotFound(_))));
        assert!(matches!(graph.resolve(""), Err(StorageError::CommitNotFound(_))));

        let unknown = CommitId::new(ObjectId::digest(b"unknown")).to_hex();
        assert!(matches!(graph.resolve(&unknown), Err(StorageError::CommitNotFound(_))));
    }

    #[test]
    fn test_resolve_ambiguous_prefix() {
        let (_dir, graph, root) = setup_graph();
        for i in 0..40 {
            child(&graph, &[root], &format!("c{}", i));
        }
        // with 41 commits, some single hex digit is shared by several ids
        let ids = graph.ids().unwrap();
        let shared = (0..16)
            .map(|d| format!("{:x}", d))
            .find(|p| ids.iter().filter(|id| id.to_hex().starts_with(p.as_str())).count() > 1)
            .unwrap();
        assert!(matches!(
            graph.resolve(&shared),
            Err(StorageError::AmbiguousCommitId(_))
        ));
    }

    #[test]
    fn test_ancestors_reach_root() {
        let (_dir, graph, root) = setup_graph();
        let a = child(&graph, &[root], "a");
        let b = child(&graph, &[a], "b");
        let side = child(&graph, &[root], "side");
        let merge = child(&graph, &[b, side], "merge");

        let walked: Vec<CommitId> = graph
            .ancestors(merge)
            .map(|info| info.unwrap().id)
            .collect();

        // breadth-first, first parent before its siblings, each commit once
        assert_eq!(walked, vec![merge, b, side, a, root]);

        let first_parent: Vec<CommitId> = graph
            .ancestors(merge)
            .first_parent_only()
            .map(|info| info.unwrap().id)
            .collect();
        assert_eq!(first_parent, vec![merge, b, a, root]);
    }

    #[test]
    fn test_ancestors_restartable() {
        let (_dir, graph, root) = setup_graph();
        let a = child(&graph, &[root], "a");
        let walk = graph.ancestors(a);
        let first: Vec<_> = walk.clone().map(|i| i.unwrap().id).collect();
        let second: Vec<_> = walk.map(|i| i.unwrap().id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_lca_linear_fork() {
        // A -> B -> C on one branch, D forks from B
        let (_dir, graph, a) = setup_graph();
        let b = child(&graph, &[a], "B");
        let c = child(&graph, &[b], "C");
        let d = child(&graph, &[b], "D");

        assert_eq!(graph.lowest_common_ancestor(c, d).unwrap(), b);
        assert_eq!(graph.lowest_common_ancestor(d, c).unwrap(), b);
    }

    #[test]
    fn test_lca_ancestor_cases() {
        let (_dir, graph, a) = setup_graph();
        let b = child(&graph, &[a], "B");
        let c = child(&graph, &[b], "C");

        assert_eq!(graph.lowest_common_ancestor(c, b).unwrap(), b);
        assert_eq!(graph.lowest_common_ancestor(b, c).unwrap(), b);
        assert_eq!(graph.lowest_common_ancestor(c, c).unwrap(), c);
    }

    #[test]
    fn test_lca_follows_merge_parents() {
        // master: root -> m1 -> m2 -> m3 -> m4
        // branch: m1 -> b1, then b2 merges m2 into the branch
        let (_dir, graph, root) = setup_graph();
        let m1 = child(&graph, &[root], "m1");
        let m2 = child(&graph, &[m1], "m2");
        let m3 = child(&graph, &[m2], "m3");
        let m4 = child(&graph, &[m3], "m4");
        let b1 = child(&graph, &[m1], "b1");
        let b2 = child(&graph, &[b1, m2], "b2");

        // a single first-parent walk would stop at m1
        assert_eq!(graph.lowest_common_ancestor(m4, b2).unwrap(), m2);
    }

    #[test]
    fn test_lca_reached_through_second_parent() {
        // master: root -> p, then merge(p, c); branch: root -> a -> c
        let (_dir, graph, root) = setup_graph();
        let p = child(&graph, &[root], "p");
        let a = child(&graph, &[root], "a");
        let c = child(&graph, &[a], "c");
        let merged = child(&graph, &[p, c], "merged");

        // root is found sooner along the first-parent line but is not lowest
        assert_eq!(graph.lowest_common_ancestor(a, merged).unwrap(), a);
        assert_eq!(graph.lowest_common_ancestor(merged, a).unwrap(), a);
        assert_eq!(graph.lowest_common_ancestor(c, merged).unwrap(), c);
    }

    #[test]
    fn test_lca_prefers_descendant_candidate() {
        // x has m1 as a direct parent and reaches m2 (a child of m1) via z
        let (_dir, graph, root) = setup_graph();
        let m1 = child(&graph, &[root], "m1");
        let m2 = child(&graph, &[m1], "m2");
        let z = child(&graph, &[m2], "z");
        let x = child(&graph, &[m1, z], "x");
        let y = child(&graph, &[m2], "y");

        assert_eq!(graph.lowest_common_ancestor(x, y).unwrap(), m2);
        assert_eq!(graph.lowest_common_ancestor(y, x).unwrap(), m2);
    }

    #[test]
    fn test_find_by_message() {
        let (_dir, graph, root) = setup_graph();
        let x = child(&graph, &[root], "same");
        let y = child(&graph, &[x], "same");
        child(&graph, &[y], "different");

        let mut expected = vec![x, y];
        expected.sort();
        assert_eq!(graph.find_by_message("same").unwrap(), expected);
        assert!(graph.find_by_message("missing").unwrap().is_empty());
    }

    #[test]
    fn test_log_entry_format() {
        let (_dir, graph, root) = setup_graph();
        let side = graph
            .append(
                &CommitBuilder::new()
                    .parent(root)
                    .message("side")
                    .timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let merge = child(&graph, &[root, side], "Merged b into master.");

        let entry = graph.info(merge).unwrap().to_string();
        assert!(entry.starts_with(&format!("===\ncommit {}\n", merge)));
        assert!(entry.contains(&format!("Merge: {} {}\n", root.short(), side.short())));
        assert!(entry.contains("\nDate: "));
        assert!(entry.ends_with("Merged b into master.\n"));

        let plain = graph.info(root).unwrap().to_string();
        assert!(!plain.contains("Merge:"));
        assert!(plain.ends_with("initial commit\n"));
    }

    #[test]
    fn test_merge_message() {
        let given = BranchName::new("b").unwrap();
        let active = BranchName::new("master").unwrap();
        assert_eq!(CommitMessage::merged(&given, &active), "Merged b into master.");
    }
}
