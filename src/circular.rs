//! Alias Admission Cycle Check
//!
//! Answers "would this alias close a loop?" before an alias is accepted.
//! Layout has its own, tolerant cycle handling; this one exists to reject.

use std::collections::BTreeSet;

use crate::model::{find_variable, CollectionNode, VariableKey};

/// Variables on the current resolution path.
///
/// A fork enters the path when it is explored and leaves it when all of its
/// own forks are done, so siblings never see each other's visits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasPath {
    visited: BTreeSet<VariableKey>,
}

impl AliasPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &VariableKey) -> bool {
        self.visited.contains(key)
    }

    /// Returns a new path with `key` appended.
    pub fn with(mut self, key: VariableKey) -> Self {
        self.visited.insert(key);
        self
    }

    fn enter(&mut self, key: VariableKey) {
        self.visited.insert(key);
    }

    fn leave(&mut self, key: &VariableKey) {
        self.visited.remove(key);
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}

/// One variable being explored, with the alias targets not yet followed.
struct Fork {
    key: VariableKey,
    pending: std::vec::IntoIter<VariableKey>,
}

impl Fork {
    /// `None` when the collection or variable is unknown.
    fn open(key: VariableKey, collections: &[CollectionNode]) -> Option<Self> {
        let (collection, variable) = find_variable(collections, &key)?;
        let pending: Vec<VariableKey> = variable
            .aliases()
            .filter_map(|(_, value)| value.alias_target(&collection.id))
            .collect();
        Some(Self { key, pending: pending.into_iter() })
    }
}

/// Would aliasing `origin` to `target` create a cycle?
///
/// Walks alias edges depth-first from `target`, across every mode of each
/// variable, on an explicit stack. The path is seeded with `origin`, so
/// arriving back at it counts as a revisit. Unknown collections or variables
/// end their branch as acyclic. A variable whose forks all came back clean is
/// cleared and never walked again.
pub fn has_circular_dependency(
    origin: &VariableKey,
    target: &VariableKey,
    collections: &[CollectionNode],
    visited_path: AliasPath,
) -> bool {
    let mut path = visited_path.with(origin.clone());
    if path.contains(target) {
        return true;
    }

    let mut cleared: BTreeSet<VariableKey> = BTreeSet::new();
    let Some(root) = Fork::open(target.clone(), collections) else {
        return false;
    };
    path.enter(root.key.clone());
    let mut stack = vec![root];

    while let Some(fork) = stack.last_mut() {
        match fork.pending.next() {
            Some(next) => {
                if path.contains(&next) {
                    return true;
                }
                if cleared.contains(&next) {
                    continue;
                }
                match Fork::open(next.clone(), collections) {
                    Some(child) => {
                        path.enter(next);
                        stack.push(child);
                    }
                    None => {
                        cleared.insert(next);
                    }
                }
            }
            None => {
                if let Some(done) = stack.pop() {
                    path.leave(&done.key);
                    cleared.insert(done.key);
                }
            }
        }
    }

    false
}
