//! Per-traversal visited set

use std::collections::HashSet;

use crate::document::NodeId;

/// Identity set of nodes already seen by one traversal. A node is recorded
/// before its children are walked, which is what cuts cycles.
#[derive(Debug, Default)]
pub struct CheckedSet {
    seen: HashSet<NodeId>,
}

impl CheckedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` and records the node the first time it is seen.
    /// Absent values are never recorded.
    pub fn should_visit(&mut self, value: Option<NodeId>) -> bool {
        match value {
            Some(id) => self.seen.insert(id),
            None => false,
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.seen.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
