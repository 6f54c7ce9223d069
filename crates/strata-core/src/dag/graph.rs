//! Adjacency over resolved commits.
//!
//! The [`GraphIndex`] only ever contains resolved commits. `previous` holds
//! the reduced parent set of each commit and `next` is its transpose, built
//! incrementally as commits resolve. Because a commit links only after all
//! of its parents did, children never need back-patching.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::commit::CommitId;
use crate::error::RepoError;

use super::reduce::is_reachable;

/// Derived previous/next adjacency plus the root and tip frontiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphIndex {
    previous: BTreeMap<CommitId, BTreeSet<CommitId>>,
    next: BTreeMap<CommitId, BTreeSet<CommitId>>,
    roots: BTreeSet<CommitId>,
    tips: BTreeSet<CommitId>,
}

impl GraphIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the resolution of `id` with its reduced parents.
    ///
    /// `is_root` reflects the *declared* parent set, which is the only
    /// definition of a root.
    pub fn link(&mut self, id: &CommitId, reduced: BTreeSet<CommitId>, is_root: bool) {
        for parent in &reduced {
            self.next.entry(parent.clone()).or_default().insert(id.clone());
            self.tips.remove(parent);
        }
        self.next.entry(id.clone()).or_default();
        self.previous.insert(id.clone(), reduced);

        if is_root {
            self.roots.insert(id.clone());
        }
        self.tips.insert(id.clone());
    }

    /// Returns `true` if `id` has been linked.
    #[must_use]
    pub fn contains(&self, id: &CommitId) -> bool {
        self.previous.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.previous.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }

    #[must_use]
    pub const fn roots(&self) -> &BTreeSet<CommitId> {
        &self.roots
    }

    #[must_use]
    pub const fn tips(&self) -> &BTreeSet<CommitId> {
        &self.tips
    }

    /// The full reduced adjacency, used as the reduction snapshot.
    #[must_use]
    pub const fn previous_map(&self) -> &BTreeMap<CommitId, BTreeSet<CommitId>> {
        &self.previous
    }

    #[must_use]
    pub const fn next_map(&self) -> &BTreeMap<CommitId, BTreeSet<CommitId>> {
        &self.next
    }

    /// Reduced parents of a resolved commit.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::UnknownCommit`] if `id` is not resolved.
    pub fn previous(&self, id: &CommitId) -> Result<&BTreeSet<CommitId>, RepoError> {
        self.previous
            .get(id)
            .ok_or_else(|| RepoError::UnknownCommit(id.clone()))
    }

    /// Children of a resolved commit.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::UnknownCommit`] if `id` is not resolved.
    pub fn next(&self, id: &CommitId) -> Result<&BTreeSet<CommitId>, RepoError> {
        self.next
            .get(id)
            .ok_or_else(|| RepoError::UnknownCommit(id.clone()))
    }

    /// All transitive parents of `id`, excluding `id` itself.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::UnknownCommit`] if `id` is not resolved.
    pub fn ancestors(&self, id: &CommitId) -> Result<HashSet<CommitId>, RepoError> {
        let start = self.previous(id)?;
        Ok(walk(start, &self.previous))
    }

    /// All transitive children of `id`, excluding `id` itself.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::UnknownCommit`] if `id` is not resolved.
    pub fn descendants(&self, id: &CommitId) -> Result<HashSet<CommitId>, RepoError> {
        let start = self.next(id)?;
        Ok(walk(start, &self.next))
    }

    /// Returns `true` if `a` is a strict ancestor of `b`.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::UnknownCommit`] if either id is not resolved.
    pub fn is_ancestor(&self, a: &CommitId, b: &CommitId) -> Result<bool, RepoError> {
        self.previous(a)?;
        self.previous(b)?;
        Ok(is_reachable(b, a, &self.previous))
    }
}

/// BFS over `edges` from the neighbours in `start`.
fn walk(
    start: &BTreeSet<CommitId>,
    edges: &BTreeMap<CommitId, BTreeSet<CommitId>>,
) -> HashSet<CommitId> {
    let mut visited: HashSet<CommitId> = HashSet::new();
    let mut queue: VecDeque<&CommitId> = start.iter().collect();

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }
        if let Some(neighbours) = edges.get(current) {
            queue.extend(neighbours.iter().filter(|n| !visited.contains(*n)));
        }
    }

    visited
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> CommitId {
        CommitId::parse(&format!("{n:02x}").repeat(32)).expect("valid id")
    }

    fn set(ids: &[u8]) -> BTreeSet<CommitId> {
        ids.iter().copied().map(id).collect()
    }

    /// 1 <- 2, 1 <- 3, {2, 3} <- 4
    fn diamond() -> GraphIndex {
        let mut graph = GraphIndex::new();
        graph.link(&id(1), set(&[]), true);
        graph.link(&id(2), set(&[1]), false);
        graph.link(&id(3), set(&[1]), false);
        graph.link(&id(4), set(&[2, 3]), false);
        graph
    }

    #[test]
    fn empty_graph() {
        let graph = GraphIndex::new();
        assert!(graph.is_empty());
        assert!(graph.roots().is_empty());
        assert!(graph.tips().is_empty());
    }

    #[test]
    fn link_maintains_frontiers() {
        let mut graph = GraphIndex::new();
        graph.link(&id(1), set(&[]), true);
        assert_eq!(graph.roots(), &set(&[1]));
        assert_eq!(graph.tips(), &set(&[1]));

        graph.link(&id(2), set(&[1]), false);
        graph.link(&id(3), set(&[1]), false);
        assert_eq!(graph.tips(), &set(&[2, 3]));

        graph.link(&id(4), set(&[2, 3]), false);
        assert_eq!(graph.tips(), &set(&[4]));
        assert_eq!(graph.roots(), &set(&[1]));
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn next_is_transpose_of_previous() {
        let graph = diamond();
        assert_eq!(graph.next(&id(1)).expect("resolved"), &set(&[2, 3]));
        assert_eq!(graph.next(&id(2)).expect("resolved"), &set(&[4]));
        assert!(graph.next(&id(4)).expect("resolved").is_empty());
        for (child, parents) in graph.previous_map() {
            for parent in parents {
                assert!(graph.next_map()[parent].contains(child));
            }
        }
    }

    #[test]
    fn unknown_ids_are_errors() {
        let graph = diamond();
        assert!(matches!(
            graph.previous(&id(9)),
            Err(RepoError::UnknownCommit(missing)) if missing == id(9)
        ));
        assert!(graph.next(&id(9)).is_err());
        assert!(graph.is_ancestor(&id(1), &id(9)).is_err());
    }

    #[test]
    fn ancestors_and_descendants() {
        let graph = diamond();
        let ancestors = graph.ancestors(&id(4)).expect("resolved");
        assert_eq!(ancestors.len(), 3);
        assert!(!ancestors.contains(&id(4)));

        let descendants = graph.descendants(&id(2)).expect("resolved");
        assert_eq!(descendants, HashSet::from([id(4)]));

        assert!(graph.is_ancestor(&id(1), &id(4)).expect("resolved"));
        assert!(!graph.is_ancestor(&id(2), &id(3)).expect("resolved"));
        assert!(!graph.is_ancestor(&id(4), &id(4)).expect("resolved"));
    }
}
