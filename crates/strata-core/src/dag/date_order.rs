//! Timestamp ordering of resolved commits.
//!
//! Entries are kept sorted by `(date, seq)` where `seq` is the resolution
//! sequence number, so commits with equal dates keep the order in which
//! they resolved.

use crate::commit::CommitId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateOrder {
    entries: Vec<(i64, u64, CommitId)>,
    next_seq: u64,
}

impl DateOrder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a newly resolved commit.
    pub fn insert(&mut self, id: CommitId, date: i64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        // seq only grows, so every existing entry with the same date sorts first.
        let pos = self.entries.partition_point(|(d, _, _)| *d <= date);
        self.entries.insert(pos, (date, seq, id));
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    #[must_use]
    pub fn ascending(&self) -> impl DoubleEndedIterator<Item = &CommitId> + ExactSizeIterator {
        self.entries.iter().map(|(_, _, id)| id)
    }

    /// Newest first.
    #[must_use]
    pub fn descending(&self) -> impl ExactSizeIterator<Item = &CommitId> {
        self.ascending().rev()
    }
}
