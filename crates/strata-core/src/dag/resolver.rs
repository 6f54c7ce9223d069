//! Buffering and cascading resolution of out-of-order commits.
//!
//! Commits may arrive before their parents (a history rebuilt from a partial
//! or unordered log). A stored commit whose parents are not all resolved is
//! *pending*: it is kept in the [`CommitStore`] but stays invisible to the
//! [`GraphIndex`] and [`DateOrder`]. Each pending commit is registered in
//! the waiting list of every parent that blocks it. A parent that is stored
//! but itself pending still blocks.
//!
//! When a commit resolves, its waiting list is drained and every waiter is
//! re-checked. Cascades use an explicit stack in depth-first order: a commit
//! and everything it unlocks finish before its next sibling is considered,
//! which keeps resolution order (and thus date tie-breaking) deterministic.
//!
//! A commit whose ancestor never arrives stays pending forever. That is a
//! valid state, not an error.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexSet;
use tracing::debug;

use crate::commit::CommitId;

use super::date_order::DateOrder;
use super::graph::GraphIndex;
use super::reduce::reduce_parents;
use super::store::CommitStore;

/// Outcome of [`DependencyResolver::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The id was already resolved or pending; nothing changed.
    AlreadyKnown,
    /// The commit resolved, followed by everything it unlocked, in
    /// resolution order.
    Resolved(Vec<CommitId>),
    /// The commit is waiting on this many unresolved parents.
    Pending { blocked_on: usize },
}

/// Pending set plus the waiting index (blocking parent -> blocked commits).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyResolver {
    pending: IndexSet<CommitId>,
    waiting: HashMap<CommitId, IndexSet<CommitId>>,
}

impl DependencyResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `id` now or defer it until its parents resolve.
    ///
    /// The record for `id` must already be in `store`.
    pub fn submit<S, I>(
        &mut self,
        id: &CommitId,
        store: &CommitStore<S, I>,
        graph: &mut GraphIndex,
        dates: &mut DateOrder,
    ) -> Submission {
        if graph.contains(id) || self.pending.contains(id) {
            return Submission::AlreadyKnown;
        }
        let Some(record) = store.get(id) else {
            debug!(commit = %id, "submit without a stored record");
            return Submission::AlreadyKnown;
        };

        let blockers: Vec<&CommitId> = record
            .declared_parents
            .iter()
            .filter(|parent| !graph.contains(parent))
            .collect();

        if blockers.is_empty() {
            return Submission::Resolved(self.cascade(id, store, graph, dates));
        }

        for parent in &blockers {
            self.waiting
                .entry((*parent).clone())
                .or_default()
                .insert(id.clone());
        }
        self.pending.insert(id.clone());
        debug!(commit = %id, blocked_on = blockers.len(), "commit pending");
        Submission::Pending {
            blocked_on: blockers.len(),
        }
    }

    fn cascade<S, I>(
        &mut self,
        start: &CommitId,
        store: &CommitStore<S, I>,
        graph: &mut GraphIndex,
        dates: &mut DateOrder,
    ) -> Vec<CommitId> {
        let mut resolved = Vec::new();
        let mut stack = vec![start.clone()];

        while let Some(current) = stack.pop() {
            if graph.contains(&current) {
                continue;
            }
            let Some(record) = store.get(&current) else {
                continue;
            };
            // Still blocked by another parent; it sits in that parent's list.
            if record.declared_parents.iter().any(|p| !graph.contains(p)) {
                continue;
            }

            let reduced = reduce_parents(&record.declared_parents, graph.previous_map());
            graph.link(&current, reduced, record.is_root());
            dates.insert(current.clone(), record.date);
            self.pending.shift_remove(&current);
            debug!(commit = %current, "commit resolved");

            if let Some(waiters) = self.waiting.remove(&current) {
                // Reversed so the first waiter is popped first.
                stack.extend(waiters.into_iter().rev());
            }
            resolved.push(current);
        }

        resolved
    }

    /// Stored commits that are not yet resolved, in arrival order.
    pub fn pending(&self) -> impl Iterator<Item = &CommitId> {
        self.pending.iter()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_pending(&self, id: &CommitId) -> bool {
        self.pending.contains(id)
    }

    /// Commits some pending commit waits on, in insertion order.
    #[must_use]
    pub fn waiting_on(&self, parent: &CommitId) -> Vec<&CommitId> {
        self.waiting
            .get(parent)
            .map(|waiters| waiters.iter().collect())
            .unwrap_or_default()
    }

    /// Ids that block a pending commit but were never stored.
    ///
    /// These are what a partial history still needs in order to resolve.
    #[must_use]
    pub fn missing_ancestors<S, I>(&self, store: &CommitStore<S, I>) -> BTreeSet<CommitId> {
        self.waiting
            .keys()
            .filter(|id| !store.contains(id))
            .cloned()
            .collect()
    }
}
