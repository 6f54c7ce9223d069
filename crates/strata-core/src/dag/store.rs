//! Append-only commit storage.
//!
//! The store is the single source of truth for commit payloads. Records are
//! reference counted so that repository snapshots share them instead of
//! copying payloads. There is deliberately no update or delete path.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::commit::{CommitId, CommitRecord};

/// Insertion-ordered map from [`CommitId`] to its [`CommitRecord`].
#[derive(Debug)]
pub struct CommitStore<S, I> {
    records: IndexMap<CommitId, Arc<CommitRecord<S, I>>>,
}

impl<S, I> CommitStore<S, I> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: IndexMap::new(),
        }
    }

    /// Store a record under `id`.
    ///
    /// Returns `false` and leaves the store untouched if `id` is already
    /// present.
    pub fn put(&mut self, id: CommitId, record: CommitRecord<S, I>) -> bool {
        if self.records.contains_key(&id) {
            return false;
        }
        self.records.insert(id, Arc::new(record));
        true
    }

    #[must_use]
    pub fn get(&self, id: &CommitId) -> Option<&CommitRecord<S, I>> {
        self.records.get(id).map(Arc::as_ref)
    }

    #[must_use]
    pub fn contains(&self, id: &CommitId) -> bool {
        self.records.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in the order they were first stored.
    pub fn iter(&self) -> impl Iterator<Item = (&CommitId, &CommitRecord<S, I>)> {
        self.records.iter().map(|(id, record)| (id, record.as_ref()))
    }
}

impl<S, I> Clone for CommitStore<S, I> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
        }
    }
}

impl<S, I> Default for CommitStore<S, I> {
    fn default() -> Self {
        Self::new()
    }
}
