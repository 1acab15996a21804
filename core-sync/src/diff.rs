//! Change classification.
//!
//! Compares the fingerprints of the documents currently in the collection
//! with the last confirmed [`Metadata`] and partitions every known path into
//! exactly one of added, modified, deleted or unchanged.

use std::collections::{BTreeMap, BTreeSet};

use crate::metadata::{Metadata, MetadataEntry};

/// Which part of the collection a diff covers
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// The whole collection: any metadata path missing from `current` is deleted
    All,
    /// Only these paths: deletions are limited to them
    Paths(&'a BTreeSet<String>),
}

impl Scope<'_> {
    fn covers(&self, path: &str) -> bool {
        match self {
            Scope::All => true,
            Scope::Paths(paths) => paths.contains(path),
        }
    }
}

/// Partition of document paths by change kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    /// Metadata of documents gone from the collection
    pub deleted: Vec<MetadataEntry>,
    pub unchanged: Vec<String>,
}

impl ChangeSet {
    /// True when no remote call is needed
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Number of documents that require a remote operation
    pub fn pending(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }
}

/// Classify `current` (`path -> hash`) against `metadata`.
pub fn diff(metadata: &Metadata, current: &BTreeMap<String, String>, scope: Scope<'_>) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (path, hash) in current {
        match metadata.get(path) {
            None => changes.added.push(path.clone()),
            Some(entry) if entry.hash != *hash => changes.modified.push(path.clone()),
            Some(_) => changes.unchanged.push(path.clone()),
        }
    }

    changes.deleted = metadata
        .entries()
        .filter(|entry| scope.covers(&entry.path) && !current.contains_key(&entry.path))
        .cloned()
        .collect();

    changes
}
