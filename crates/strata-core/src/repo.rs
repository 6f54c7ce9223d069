//! The commit repository.
//!
//! [`Repository`] composes the [`dag`](crate::dag) pieces behind one value.
//! It behaves as a persistent value: [`Repository::add`] returns a new
//! snapshot and leaves the receiver untouched. Snapshots share commit
//! payloads through reference counting, so taking one copies only the
//! indexes. [`Repository::insert`] is the in-place form for a single owner.
//!
//! There is no internal locking. Callers serialize writes against a given
//! snapshot themselves.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::clock::Clock;
use crate::commit::{
    Blake3Hasher, CommitId, CommitRecord, ContentHasher, MAX_PARENTS, commit_id_for,
    verify_record,
};
use crate::dag::{CommitStore, DateOrder, DependencyResolver, GraphIndex, Submission};
use crate::error::RepoError;

/// A content-addressed, append-only history of commits.
///
/// `S` is the source snapshot type and `I` the metadata type. Both are
/// opaque to the repository apart from their serde representation, which
/// feeds the commit hash.
#[derive(Debug)]
pub struct Repository<S, I> {
    store: CommitStore<S, I>,
    graph: GraphIndex,
    resolver: DependencyResolver,
    dates: DateOrder,
    hasher: Arc<dyn ContentHasher>,
}

impl<S, I> Repository<S, I> {
    /// An empty repository hashing with BLAKE3.
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(Arc::new(Blake3Hasher))
    }

    /// An empty repository with a custom digest collaborator.
    #[must_use]
    pub fn with_hasher(hasher: Arc<dyn ContentHasher>) -> Self {
        Self {
            store: CommitStore::new(),
            graph: GraphIndex::new(),
            resolver: DependencyResolver::new(),
            dates: DateOrder::new(),
            hasher,
        }
    }

    /// The digest collaborator every id in this repository was computed with.
    #[must_use]
    pub fn hasher(&self) -> &dyn ContentHasher {
        self.hasher.as_ref()
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// The stored record for `id`, resolved or pending.
    #[must_use]
    pub fn get(&self, id: &CommitId) -> Option<&CommitRecord<S, I>> {
        self.store.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &CommitId) -> bool {
        self.store.contains(id)
    }

    #[must_use]
    pub fn is_resolved(&self, id: &CommitId) -> bool {
        self.graph.contains(id)
    }

    #[must_use]
    pub fn is_pending(&self, id: &CommitId) -> bool {
        self.resolver.is_pending(id)
    }

    /// Number of stored commits, resolved or pending.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    #[must_use]
    pub fn resolved_len(&self) -> usize {
        self.graph.len()
    }

    /// Every stored record in arrival order.
    pub fn records(&self) -> impl Iterator<Item = (&CommitId, &CommitRecord<S, I>)> {
        self.store.iter()
    }

    // -----------------------------------------------------------------------
    // Graph queries
    // -----------------------------------------------------------------------

    /// Resolved commits that declare no parents.
    #[must_use]
    pub const fn roots(&self) -> &BTreeSet<CommitId> {
        self.graph.roots()
    }

    /// Resolved commits that no resolved commit has as a parent.
    #[must_use]
    pub const fn tips(&self) -> &BTreeSet<CommitId> {
        self.graph.tips()
    }

    /// Resolved commits, newest first.
    #[must_use]
    pub fn commits_by_date(&self) -> impl ExactSizeIterator<Item = &CommitId> {
        self.dates.descending()
    }

    /// Resolved commits, oldest first.
    #[must_use]
    pub fn commits_by_date_ascending(&self) -> impl ExactSizeIterator<Item = &CommitId> {
        self.dates.ascending()
    }

    /// Reduced parents of a resolved commit.
    ///
    /// # Errors
    ///
    /// [`RepoError::UnknownCommit`] if `id` is not resolved. Callers only
    /// hold ids obtained from this repository, so this signals a bug.
    pub fn previous_commits(&self, id: &CommitId) -> Result<&BTreeSet<CommitId>, RepoError> {
        self.graph.previous(id)
    }

    /// Children of a resolved commit.
    ///
    /// # Errors
    ///
    /// [`RepoError::UnknownCommit`] if `id` is not resolved.
    pub fn next_commits(&self, id: &CommitId) -> Result<&BTreeSet<CommitId>, RepoError> {
        self.graph.next(id)
    }

    /// # Errors
    ///
    /// [`RepoError::UnknownCommit`] if `id` is not resolved.
    pub fn ancestors(&self, id: &CommitId) -> Result<HashSet<CommitId>, RepoError> {
        self.graph.ancestors(id)
    }

    /// # Errors
    ///
    /// [`RepoError::UnknownCommit`] if `id` is not resolved.
    pub fn descendants(&self, id: &CommitId) -> Result<HashSet<CommitId>, RepoError> {
        self.graph.descendants(id)
    }

    /// Returns `true` if `a` is a strict ancestor of `b`.
    ///
    /// # Errors
    ///
    /// [`RepoError::UnknownCommit`] if either id is not resolved.
    pub fn is_ancestor(&self, a: &CommitId, b: &CommitId) -> Result<bool, RepoError> {
        self.graph.is_ancestor(a, b)
    }

    /// The derived graph, for callers that render it.
    #[must_use]
    pub const fn graph(&self) -> &GraphIndex {
        &self.graph
    }

    // -----------------------------------------------------------------------
    // Pending state
    // -----------------------------------------------------------------------

    /// Stored commits still waiting on an ancestor, in arrival order.
    pub fn pending(&self) -> impl Iterator<Item = &CommitId> {
        self.resolver.pending()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.resolver.pending_len()
    }

    /// Ids referenced as parents by pending commits but never stored.
    #[must_use]
    pub fn missing_ancestors(&self) -> BTreeSet<CommitId> {
        self.resolver.missing_ancestors(&self.store)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Removing commits is not supported: the history is append-only.
    ///
    /// # Errors
    ///
    /// Always returns [`RepoError::UnsupportedOperation`].
    pub fn remove(&self, id: &CommitId) -> Result<Self, RepoError> {
        debug!(commit = %id, "rejected commit removal");
        Err(RepoError::UnsupportedOperation("removing a commit"))
    }
}

impl<S, I> Repository<S, I>
where
    S: Serialize,
    I: Serialize,
{
    /// Add a commit and return the resulting snapshot with the commit's id.
    ///
    /// Adding a commit that is already stored returns an unchanged snapshot
    /// and the existing id. A commit whose parents are not all resolved is
    /// stored as pending and resolves once they are.
    ///
    /// # Errors
    ///
    /// [`RepoError::TooManyParents`] if `previous` has more than
    /// [`MAX_PARENTS`] entries, checked before hashing. [`RepoError::Json`]
    /// if a payload has no JSON representation.
    pub fn add(
        &self,
        source: S,
        previous: BTreeSet<CommitId>,
        date: i64,
        info: I,
    ) -> Result<(Self, CommitId), RepoError> {
        let mut next = self.clone();
        let id = next.insert(source, previous, date, info)?;
        Ok((next, id))
    }

    /// [`add`](Self::add) stamped with the current time of `clock`.
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    pub fn commit_now(
        &self,
        clock: &dyn Clock,
        source: S,
        previous: BTreeSet<CommitId>,
        info: I,
    ) -> Result<(Self, CommitId), RepoError> {
        self.add(source, previous, clock.now_millis(), info)
    }

    /// In-place form of [`add`](Self::add).
    ///
    /// On error the repository is left unchanged.
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    pub fn insert(
        &mut self,
        source: S,
        previous: BTreeSet<CommitId>,
        date: i64,
        info: I,
    ) -> Result<CommitId, RepoError> {
        if previous.len() > MAX_PARENTS {
            return Err(RepoError::TooManyParents {
                count: previous.len(),
                max: MAX_PARENTS,
            });
        }

        let id = commit_id_for(self.hasher(), &source, &previous, date, &info)?;
        if self.store.contains(&id) {
            debug!(commit = %id, "commit already stored");
            return Ok(id);
        }

        self.store.put(
            id.clone(),
            CommitRecord {
                source,
                declared_parents: previous,
                date,
                info,
            },
        );

        match self
            .resolver
            .submit(&id, &self.store, &mut self.graph, &mut self.dates)
        {
            Submission::Resolved(unlocked) if unlocked.len() > 1 => {
                debug!(
                    commit = %id,
                    unlocked = unlocked.len() - 1,
                    "commit unlocked pending descendants"
                );
            }
            Submission::Resolved(_) | Submission::Pending { .. } | Submission::AlreadyKnown => {}
        }

        Ok(id)
    }

    /// Recompute every stored id and return those that no longer match
    /// their record.
    ///
    /// # Errors
    ///
    /// [`RepoError::Json`] if a payload has no JSON representation.
    pub fn verify(&self) -> Result<Vec<CommitId>, RepoError> {
        let mut mismatched = Vec::new();
        for (id, record) in self.store.iter() {
            if !verify_record(self.hasher(), id, record)? {
                mismatched.push(id.clone());
            }
        }
        Ok(mismatched)
    }
}

impl<S, I> Clone for Repository<S, I> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            graph: self.graph.clone(),
            resolver: self.resolver.clone(),
            dates: self.dates.clone(),
            hasher: Arc::clone(&self.hasher),
        }
    }
}

impl<S, I> Default for Repository<S, I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ErrorCode;

    type Repo = Repository<String, String>;

    fn parents(ids: &[&CommitId]) -> BTreeSet<CommitId> {
        ids.iter().map(|&id| id.clone()).collect()
    }

    #[test]
    fn add_returns_new_snapshot() {
        let empty = Repo::new();
        let (repo, root) = empty
            .add("x".into(), BTreeSet::new(), 1, "init".into())
            .expect("add");
        assert!(empty.is_empty());
        assert!(empty.get(&root).is_none());
        assert_eq!(repo.len(), 1);
        assert!(repo.is_resolved(&root));
    }

    #[test]
    fn add_is_idempotent() {
        let (repo, first) = Repo::new()
            .add("x".into(), BTreeSet::new(), 1, "init".into())
            .expect("add");
        let (again, second) = repo
            .add("x".into(), BTreeSet::new(), 1, "init".into())
            .expect("add");
        assert_eq!(first, second);
        assert_eq!(again.len(), 1);
        assert_eq!(again.roots(), repo.roots());
        assert_eq!(again.tips(), repo.tips());
        assert_eq!(again.graph(), repo.graph());
        assert!(again.commits_by_date().eq(repo.commits_by_date()));
    }

    #[test]
    fn too_many_parents_is_rejected_before_storing() {
        let mut repo = Repo::new();
        let mut ids = BTreeSet::new();
        for n in 0..9 {
            let id = repo
                .insert(format!("root {n}"), BTreeSet::new(), n, String::new())
                .expect("insert");
            ids.insert(id);
        }
        let before = repo.len();

        let err = repo
            .insert("merge".into(), ids.clone(), 100, String::new())
            .expect_err("nine parents");
        assert!(matches!(err, RepoError::TooManyParents { count: 9, max: 8 }));
        assert_eq!(err.code(), ErrorCode::TooManyParents);
        assert_eq!(repo.len(), before);

        let eight: BTreeSet<_> = ids.into_iter().take(8).collect();
        let merge = repo
            .insert("merge".into(), eight, 100, String::new())
            .expect("eight parents");
        assert_eq!(repo.tips().len(), 2);
        assert!(repo.tips().contains(&merge));
    }

    #[test]
    fn pending_commit_is_invisible_until_parent_arrives() {
        // Build the parent id in a scratch repo so the child can reference it.
        let (scratch, parent) = Repo::new()
            .add("a".into(), BTreeSet::new(), 1, String::new())
            .expect("add");
        drop(scratch);

        let (repo, child) = Repo::new()
            .add("b".into(), parents(&[&parent]), 2, String::new())
            .expect("add");
        assert!(repo.is_pending(&child));
        assert!(!repo.is_resolved(&child));
        assert!(repo.tips().is_empty());
        assert_eq!(repo.commits_by_date().len(), 0);
        assert_eq!(repo.missing_ancestors(), parents(&[&parent]));
        assert!(matches!(
            repo.previous_commits(&child),
            Err(RepoError::UnknownCommit(_))
        ));
        assert!(repo.get(&child).is_some());

        let (repo, same_parent) = repo
            .add("a".into(), BTreeSet::new(), 1, String::new())
            .expect("add");
        assert_eq!(same_parent, parent);
        assert_eq!(repo.pending_len(), 0);
        assert_eq!(repo.next_commits(&parent).expect("resolved"), &parents(&[&child]));
    }

    #[test]
    fn remove_is_unsupported() {
        let (repo, id) = Repo::new()
            .add("x".into(), BTreeSet::new(), 1, String::new())
            .expect("add");
        let err = repo.remove(&id).expect_err("remove must fail");
        assert!(matches!(err, RepoError::UnsupportedOperation(_)));
        assert!(repo.contains(&id));
    }

    #[test]
    fn commit_now_uses_clock() {
        let clock = ManualClock::new(42);
        let (repo, id) = Repo::new()
            .commit_now(&clock, "x".into(), BTreeSet::new(), String::new())
            .expect("add");
        assert_eq!(repo.get(&id).map(|r| r.date), Some(42));

        clock.advance(1);
        let (repo, later) = repo
            .commit_now(&clock, "y".into(), parents(&[&id]), String::new())
            .expect("add");
        assert_eq!(repo.commits_by_date().next(), Some(&later));
    }

    #[derive(Debug)]
    struct KeyedHasher;

    impl ContentHasher for KeyedHasher {
        fn digest(&self, canonical: &[u8]) -> [u8; 32] {
            *blake3::keyed_hash(&[7; 32], canonical).as_bytes()
        }
    }

    #[test]
    fn custom_hasher_changes_ids() {
        let default_repo = Repo::new();
        let keyed_repo = Repo::with_hasher(Arc::new(KeyedHasher));
        let (_, a) = default_repo
            .add("x".into(), BTreeSet::new(), 1, String::new())
            .expect("add");
        let (keyed_repo, b) = keyed_repo
            .add("x".into(), BTreeSet::new(), 1, String::new())
            .expect("add");
        assert_ne!(a, b);
        assert_eq!(keyed_repo.hasher().digest(b"x"), KeyedHasher.digest(b"x"));
        assert!(keyed_repo.verify().expect("verify").is_empty());
    }

    #[test]
    fn verify_passes_for_untouched_history() {
        let (repo, root) = Repo::new()
            .add("x".into(), BTreeSet::new(), 1, String::new())
            .expect("add");
        let (repo, _) = repo
            .add("y".into(), parents(&[&root]), 2, String::new())
            .expect("add");
        assert!(repo.verify().expect("verify").is_empty());
    }
}
