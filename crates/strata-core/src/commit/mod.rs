//! Commit data model.
//!
//! A commit pairs an opaque source snapshot with its declared parents, a
//! millisecond timestamp and opaque metadata. Its identity is a BLAKE3 digest
//! of that content (see [`hash`]), so two logically equal commits always
//! share one [`CommitId`].
//!
//! # Sub-modules
//!
//! - [`canonical`]: canonical JSON used as the hash input.
//! - [`hash`]: the pluggable [`ContentHasher`](hash::ContentHasher) and
//!   id computation.

pub mod canonical;
pub mod hash;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub use canonical::canonicalize_json;
pub use hash::{Blake3Hasher, ContentHasher, commit_id_for, verify_record};

/// Upper bound on the number of parents a single commit may declare.
pub const MAX_PARENTS: usize = 8;

/// Length of the hex digest carried by a [`CommitId`].
pub const COMMIT_ID_LEN: usize = 64;

// ---------------------------------------------------------------------------
// CommitId
// ---------------------------------------------------------------------------

/// Content-derived identifier of a commit: 64 lowercase hex characters.
///
/// Ordering is lexicographic on the hex string, which is the order used when
/// parents are canonicalized for hashing and when they are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitId(String);

/// A string that is not a well-formed [`CommitId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid commit id {raw:?}: expected 64 lowercase hex characters")]
pub struct InvalidCommitId {
    pub raw: String,
}

impl CommitId {
    /// Parse and validate a commit id.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCommitId`] unless `raw` is exactly
    /// [`COMMIT_ID_LEN`] characters of `[0-9a-f]`.
    pub fn parse(raw: &str) -> Result<Self, InvalidCommitId> {
        let well_formed = raw.len() == COMMIT_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if well_formed {
            Ok(Self(raw.to_owned()))
        } else {
            Err(InvalidCommitId {
                raw: raw.to_owned(),
            })
        }
    }

    /// Hex-encode a 256-bit digest produced by a [`ContentHasher`].
    #[must_use]
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(blake3::Hash::from(digest).to_hex().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `len` characters, for compact display in history views.
    #[must_use]
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommitId {
    type Err = InvalidCommitId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CommitId {
    type Error = InvalidCommitId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CommitId> for String {
    fn from(id: CommitId) -> Self {
        id.0
    }
}

impl AsRef<str> for CommitId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// CommitRecord
// ---------------------------------------------------------------------------

/// An immutable commit as submitted to the repository.
///
/// `declared_parents` is kept exactly as submitted even when the graph
/// stores a reduced parent set, so the id can always be recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord<S, I> {
    /// Opaque source snapshot owned by the term-model collaborator.
    pub source: S,
    /// Parents as declared by the caller.
    pub declared_parents: BTreeSet<CommitId>,
    /// Milliseconds since the Unix epoch.
    pub date: i64,
    /// Opaque metadata (label, author, editor action).
    pub info: I,
}

impl<S, I> CommitRecord<S, I> {
    /// Returns `true` if the commit declares no parents.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.declared_parents.is_empty()
    }

    /// The commit date as a UTC timestamp, if it is in chrono's range.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.date).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262";

    #[test]
    fn parse_accepts_lowercase_hex() {
        let id = CommitId::parse(SAMPLE).expect("valid id");
        assert_eq!(id.as_str(), SAMPLE);
        assert_eq!(id.to_string(), SAMPLE);
        assert_eq!(id.short(7), "af1349b");
    }

    #[test]
    fn parse_rejects_bad_shapes() {
        assert!(CommitId::parse("").is_err());
        assert!(CommitId::parse(&SAMPLE[..63]).is_err());
        assert!(CommitId::parse(&SAMPLE.to_uppercase()).is_err());
        assert!(CommitId::parse(&format!("{}g", &SAMPLE[..63])).is_err());
    }

    #[test]
    fn serde_round_trip_validates() {
        let id = CommitId::parse(SAMPLE).expect("valid id");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{SAMPLE}\""));
        let back: CommitId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
        assert!(serde_json::from_str::<CommitId>("\"nope\"").is_err());
    }

    #[test]
    fn record_timestamp_converts_millis() {
        let record = CommitRecord {
            source: (),
            declared_parents: BTreeSet::new(),
            date: 1_700_000_000_123,
            info: (),
        };
        assert!(record.is_root());
        let ts = record.timestamp().expect("in range");
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_123);
    }
}
