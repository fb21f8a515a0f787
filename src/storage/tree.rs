//! Snapshots of the tracked file set.
//!
//! A snapshot maps every tracked file name to the blob holding its
//! content. It is stored inline in each commit. The backing map is ordered,
//! so both the encoded form (and therefore the commit id) and every
//! listing derived from it are deterministic.

use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::storage::types::{BlobId, FileName};

/// the full tracked-file state at a commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: BTreeMap<FileName, BlobId>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<BlobId> {
        self.entries.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// insert or overwrite a file entry
    pub fn insert(&mut self, path: FileName, id: BlobId) -> Option<BlobId> {
        self.entries.insert(path, id)
    }

    pub fn remove(&mut self, path: &str) -> Option<BlobId> {
        self.entries.remove(path)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, FileName, BlobId> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &FileName> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// every path tracked by any of the given snapshots, in order
    pub fn union_paths<'a>(snapshots: &[&'a Snapshot]) -> BTreeSet<&'a FileName> {
        snapshots.iter().copied().flat_map(|s| s.paths()).collect()
    }
}

impl FromIterator<(FileName, BlobId)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (FileName, BlobId)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a FileName, &'a BlobId);
    type IntoIter = btree_map::Iter<'a, FileName, BlobId>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::ObjectId;

    fn blob(content: &[u8]) -> BlobId {
        BlobId::new(ObjectId::digest(content))
    }

    fn name(s: &str) -> FileName {
        FileName::new(s).unwrap()
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut snapshot = Snapshot::new();
        assert!(snapshot.is_empty());

        snapshot.insert(name("b.txt"), blob(b"b"));
        snapshot.insert(name("a.txt"), blob(b"a"));

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("a.txt"), Some(blob(b"a")));
        assert!(!snapshot.contains("c.txt"));

        // iteration is lexicographic
        let paths: Vec<_> = snapshot.paths().map(|p| p.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_overwrite_and_remove() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(name("f"), blob(b"1"));
        let old = snapshot.insert(name("f"), blob(b"2"));

        assert_eq!(old, Some(blob(b"1")));
        assert_eq!(snapshot.remove("f"), Some(blob(b"2")));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_encoding_is_order_independent() {
        let a: Snapshot = vec![(name("x"), blob(b"x")), (name("y"), blob(b"y"))]
            .into_iter()
            .collect();
        let b: Snapshot = vec![(name("y"), blob(b"y")), (name("x"), blob(b"x"))]
            .into_iter()
            .collect();

        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }

    #[test]
    fn test_union_paths() {
        let a: Snapshot = vec![(name("x"), blob(b"x"))].into_iter().collect();
        let b: Snapshot = vec![(name("y"), blob(b"y")), (name("x"), blob(b"z"))]
            .into_iter()
            .collect();

        let union = Snapshot::union_paths(&[&a, &b]);
        let names: Vec<_> = union.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
    }
}
