//! Transitive reduction of a commit's declared parents.
//!
//! If a declared parent `P` is already an ancestor of another declared
//! parent `Q`, the edge to `P` adds no reachability and is dropped from the
//! stored adjacency. The declared set itself is never changed.
//!
//! Reachability walks use an explicit stack and visited set, so corrupted
//! adjacency (including cycles) cannot cause unbounded work or recursion.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::trace;

use crate::commit::CommitId;

/// Compute the minimal parent set with the same reachability as `declared`.
///
/// `previous` is the reduced adjacency of the already-resolved graph. Every
/// declared parent is expected to be resolved; unknown ids are treated as
/// having no ancestors.
///
/// Runs in O(k² · d) for k declared parents and ancestor depth d.
#[must_use]
pub fn reduce_parents(
    declared: &BTreeSet<CommitId>,
    previous: &BTreeMap<CommitId, BTreeSet<CommitId>>,
) -> BTreeSet<CommitId> {
    if declared.len() <= 1 {
        return declared.clone();
    }

    let reduced: BTreeSet<CommitId> = declared
        .iter()
        .filter(|&candidate| {
            !declared
                .iter()
                .any(|other| other != candidate && is_reachable(other, candidate, previous))
        })
        .cloned()
        .collect();

    if reduced.len() < declared.len() {
        trace!(
            declared = declared.len(),
            kept = reduced.len(),
            "dropped redundant ancestor edges"
        );
    }
    reduced
}

/// Returns `true` if `target` is a strict ancestor of `from`.
#[must_use]
pub fn is_reachable(
    from: &CommitId,
    target: &CommitId,
    previous: &BTreeMap<CommitId, BTreeSet<CommitId>>,
) -> bool {
    let mut visited: HashSet<&CommitId> = HashSet::new();
    let mut stack: Vec<&CommitId> = previous
        .get(from)
        .map(|parents| parents.iter().collect())
        .unwrap_or_default();

    while let Some(current) = stack.pop() {
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(parents) = previous.get(current) {
            stack.extend(parents.iter().filter(|p| !visited.contains(p)));
        }
    }

    false
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

    /// 1 <- 2 <- 3, and 1 <- 4 (4 is a sibling branch of 2).
    fn chain() -> BTreeMap<CommitId, BTreeSet<CommitId>> {
        BTreeMap::from([
            (id(1), set(&[])),
            (id(2), set(&[1])),
            (id(3), set(&[2])),
            (id(4), set(&[1])),
        ])
    }

    #[test]
    fn zero_or_one_parent_is_unchanged() {
        let previous = chain();
        assert_eq!(reduce_parents(&set(&[]), &previous), set(&[]));
        assert_eq!(reduce_parents(&set(&[1]), &previous), set(&[1]));
    }

    #[test]
    fn direct_ancestor_is_dropped() {
        assert_eq!(reduce_parents(&set(&[1, 2]), &chain()), set(&[2]));
    }

    #[test]
    fn transitive_ancestor_is_dropped() {
        assert_eq!(reduce_parents(&set(&[1, 3]), &chain()), set(&[3]));
        assert_eq!(reduce_parents(&set(&[1, 2, 3]), &chain()), set(&[3]));
    }

    #[test]
    fn incomparable_parents_are_kept() {
        assert_eq!(reduce_parents(&set(&[3, 4]), &chain()), set(&[3, 4]));
        assert_eq!(reduce_parents(&set(&[1, 3, 4]), &chain()), set(&[3, 4]));
    }

    #[test]
    fn reachability_is_strict() {
        let previous = chain();
        assert!(is_reachable(&id(3), &id(1), &previous));
        assert!(!is_reachable(&id(1), &id(3), &previous));
        assert!(!is_reachable(&id(1), &id(1), &previous));
        assert!(!is_reachable(&id(4), &id(2), &previous));
    }

    #[test]
    fn cyclic_adjacency_terminates() {
        let previous = BTreeMap::from([
            (id(1), set(&[2])),
            (id(2), set(&[3])),
            (id(3), set(&[1])),
        ]);
        assert!(!is_reachable(&id(1), &id(9), &previous));
        assert!(is_reachable(&id(1), &id(3), &previous));
        assert_eq!(reduce_parents(&set(&[7, 9]), &previous), set(&[7, 9]));
    }
}
