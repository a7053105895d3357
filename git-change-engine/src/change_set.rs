//! Per-request mapping of file path to new content or patch.

use std::collections::HashMap;

use serde::Serialize;

/// What to do with one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Change {
    /// Full replacement text.
    Replace(String),
    /// Unified-diff body to apply against the current file.
    Patch(String),
}

/// Insertion-ordered, one entry per path.
///
/// Re-inserting a path replaces its change in place (last write wins, first
/// position kept).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    entries: Vec<(String, Change)>,
    index: HashMap<String, usize>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the change for `path`; returns the previous one.
    pub fn insert(&mut self, path: impl Into<String>, change: Change) -> Option<Change> {
        let path = path.into();
        match self.index.get(&path) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, change)),
            None => {
                self.index.insert(path.clone(), self.entries.len());
                self.entries.push((path, change));
                None
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&Change> {
        self.index.get(path).map(|&i| &self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Change)> {
        self.entries.iter().map(|(p, c)| (p.as_str(), c))
    }
}
