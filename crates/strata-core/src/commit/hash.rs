//! Content addressing for commits.
//!
//! The hash input is the canonical JSON of
//!
//! ```text
//! {"date": <ms>, "info": <info>, "previous": [<sorted parent ids>], "source": <source>}
//! ```
//!
//! where `source` and `info` are the serde representations of the payloads.
//! Sorting the parent ids and the object keys makes the id independent of
//! how the caller assembled the commit.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};

use super::canonical::canonical_bytes;
use super::{CommitId, CommitRecord};
use crate::error::RepoError;

/// Digest collaborator for canonical commit bytes.
///
/// Implementations must be pure: identical input always yields an identical
/// digest, and the digest must be collision resistant. The 256-bit output
/// is what keeps every [`CommitId`] the same fixed-length hex format.
pub trait ContentHasher: fmt::Debug + Send + Sync {
    fn digest(&self, canonical: &[u8]) -> [u8; 32];
}

/// Default hasher: full 256-bit BLAKE3, lowercase hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl ContentHasher for Blake3Hasher {
    fn digest(&self, canonical: &[u8]) -> [u8; 32] {
        *blake3::hash(canonical).as_bytes()
    }
}

/// Compute the id of a candidate commit.
///
/// # Errors
///
/// Returns [`RepoError::Json`] if either payload cannot be represented as
/// JSON (e.g. a map with non-string keys).
pub fn commit_id_for<S, I>(
    hasher: &dyn ContentHasher,
    source: &S,
    parents: &BTreeSet<CommitId>,
    date: i64,
    info: &I,
) -> Result<CommitId, RepoError>
where
    S: Serialize,
    I: Serialize,
{
    // BTreeSet iteration is already lexicographic.
    let previous: Vec<&str> = parents.iter().map(CommitId::as_str).collect();
    let canonical: Value = json!({
        "date": date,
        "info": serde_json::to_value(info)?,
        "previous": previous,
        "source": serde_json::to_value(source)?,
    });
    Ok(CommitId::from_digest(hasher.digest(&canonical_bytes(&canonical))))
}

/// Recompute a stored record's id and compare it with `id`.
///
/// Returns `false` when the record no longer matches its id, which means it
/// was modified after it was addressed.
///
/// # Errors
///
/// Same as [`commit_id_for`].
pub fn verify_record<S, I>(
    hasher: &dyn ContentHasher,
    id: &CommitId,
    record: &CommitRecord<S, I>,
) -> Result<bool, RepoError>
where
    S: Serialize,
    I: Serialize,
{
    let expected = commit_id_for(
        hasher,
        &record.source,
        &record.declared_parents,
        record.date,
        &record.info,
    )?;
    Ok(&expected == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::COMMIT_ID_LEN;
    use std::collections::BTreeMap;

    fn root_id(source: &str, date: i64) -> CommitId {
        commit_id_for(&Blake3Hasher, &source, &BTreeSet::new(), date, &"info").expect("hash")
    }

    #[test]
    fn id_is_fixed_length_hex() {
        let id = root_id("(lam x x)", 1);
        assert_eq!(id.as_str().len(), COMMIT_ID_LEN);
        assert!(CommitId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(root_id("(lam x x)", 1), root_id("(lam x x)", 1));
    }

    #[test]
    fn every_field_feeds_the_hash() {
        let base = root_id("(lam x x)", 1);
        assert_ne!(base, root_id("(lam y y)", 1));
        assert_ne!(base, root_id("(lam x x)", 2));

        let other_info = commit_id_for(&Blake3Hasher, &"(lam x x)", &BTreeSet::new(), 1, &"other")
            .expect("hash");
        assert_ne!(base, other_info);

        let parents: BTreeSet<_> = [root_id("seed", 0)].into();
        let with_parent =
            commit_id_for(&Blake3Hasher, &"(lam x x)", &parents, 1, &"info").expect("hash");
        assert_ne!(base, with_parent);
    }

    #[test]
    fn payload_key_order_does_not_matter() {
        let mut a = BTreeMap::new();
        a.insert("param", "x");
        a.insert("body", "x");
        let b = json!({"body": "x", "param": "x"});
        let id_a = commit_id_for(&Blake3Hasher, &a, &BTreeSet::new(), 7, &()).expect("hash");
        let id_b = commit_id_for(&Blake3Hasher, &b, &BTreeSet::new(), 7, &()).expect("hash");
        assert_eq!(id_a, id_b);
    }

    #[test]
    fn verify_detects_tampering() {
        let mut record = CommitRecord {
            source: "(app f x)".to_owned(),
            declared_parents: BTreeSet::new(),
            date: 10,
            info: "edit".to_owned(),
        };
        let id = commit_id_for(
            &Blake3Hasher,
            &record.source,
            &record.declared_parents,
            record.date,
            &record.info,
        )
        .expect("hash");
        assert!(verify_record(&Blake3Hasher, &id, &record).expect("verify"));

        record.date += 1;
        assert!(!verify_record(&Blake3Hasher, &id, &record).expect("verify"));
    }
}
