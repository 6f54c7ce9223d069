//! Round-tripping a repository through plain JSON.
//!
//! The persisted form is a flat list of records:
//!
//! ```text
//! [{"source": <source codec output>, "previous": ["<id>", ...], "date": <ms>, "info": <info codec output>}, ...]
//! ```
//!
//! `previous` holds the *declared* parents, sorted, so every commit hashes
//! to the same id after a reload. The list is written in arrival order but
//! loading does not rely on it being causal: records are replayed through
//! [`Repository::insert`] and the resolver buffers whatever arrives early.
//!
//! Loading is fail-closed. Every record is validated before any is replayed,
//! and the first malformed one aborts the whole load.

use std::collections::BTreeSet;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::commit::{CommitId, MAX_PARENTS};
use crate::error::RepoError;
use crate::repo::Repository;

/// Pluggable encoder/decoder for an opaque payload (`source` or `info`).
pub trait PayloadCodec<T> {
    /// # Errors
    ///
    /// A human-readable reason if the value cannot be encoded.
    fn encode(&self, value: &T) -> Result<Value, String>;

    /// # Errors
    ///
    /// A human-readable reason if the JSON does not describe a `T`.
    fn decode(&self, value: &Value) -> Result<T, String>;
}

/// Codec that uses the payload's own serde implementation.
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec<T>(PhantomData<fn() -> T>);

impl<T> JsonCodec<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PayloadCodec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Value, String> {
        serde_json::to_value(value).map_err(|e| e.to_string())
    }

    fn decode(&self, value: &Value) -> Result<T, String> {
        T::deserialize(value).map_err(|e| e.to_string())
    }
}

/// A commit as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCommit {
    pub source: Value,
    pub previous: Vec<String>,
    pub date: i64,
    pub info: Value,
}

// ---------------------------------------------------------------------------
// Serialize
// ---------------------------------------------------------------------------

/// Flatten every stored commit, resolved or pending, in arrival order.
///
/// # Errors
///
/// [`RepoError::Payload`] if a codec rejects a payload.
pub fn serialize<S, I>(
    repo: &Repository<S, I>,
    source_codec: &dyn PayloadCodec<S>,
    info_codec: &dyn PayloadCodec<I>,
) -> Result<Vec<PersistedCommit>, RepoError> {
    repo.records()
        .map(|(_, record)| -> Result<PersistedCommit, RepoError> {
            Ok(PersistedCommit {
                source: source_codec
                    .encode(&record.source)
                    .map_err(RepoError::Payload)?,
                previous: record
                    .declared_parents
                    .iter()
                    .map(|id| id.as_str().to_owned())
                    .collect(),
                date: record.date,
                info: info_codec.encode(&record.info).map_err(RepoError::Payload)?,
            })
        })
        .collect()
}

/// [`serialize`] into a JSON tree.
///
/// # Errors
///
/// Same as [`serialize`].
pub fn to_value<S, I>(
    repo: &Repository<S, I>,
    source_codec: &dyn PayloadCodec<S>,
    info_codec: &dyn PayloadCodec<I>,
) -> Result<Value, RepoError> {
    Ok(serde_json::to_value(serialize(repo, source_codec, info_codec)?)?)
}

/// [`serialize`] into a compact text blob.
///
/// # Errors
///
/// Same as [`serialize`].
pub fn to_json_string<S, I>(
    repo: &Repository<S, I>,
    source_codec: &dyn PayloadCodec<S>,
    info_codec: &dyn PayloadCodec<I>,
) -> Result<String, RepoError> {
    Ok(serde_json::to_string(&serialize(
        repo,
        source_codec,
        info_codec,
    )?)?)
}

// ---------------------------------------------------------------------------
// Deserialize
// ---------------------------------------------------------------------------

/// Rebuild a repository from its persisted JSON tree.
///
/// # Errors
///
/// [`RepoError::MalformedRecord`] for the first record with a missing field,
/// a wrong value shape, an invalid parent id or a payload the codec rejects.
/// [`RepoError::TooManyParents`] if a record declares too many parents.
pub fn deserialize<S, I>(
    value: &Value,
    source_codec: &dyn PayloadCodec<S>,
    info_codec: &dyn PayloadCodec<I>,
) -> Result<Repository<S, I>, RepoError>
where
    S: Serialize,
    I: Serialize,
{
    deserialize_into(Repository::new(), value, source_codec, info_codec)
}

/// Replay a persisted JSON tree on top of an existing repository.
///
/// Commits already present are skipped by id, so loading the same log
/// twice is harmless.
///
/// # Errors
///
/// Same as [`deserialize`]. On error `base` is dropped; no partially loaded
/// repository is returned.
pub fn deserialize_into<S, I>(
    mut base: Repository<S, I>,
    value: &Value,
    source_codec: &dyn PayloadCodec<S>,
    info_codec: &dyn PayloadCodec<I>,
) -> Result<Repository<S, I>, RepoError>
where
    S: Serialize,
    I: Serialize,
{
    let Value::Array(items) = value else {
        return Err(malformed(0, "expected a list of commit records"));
    };

    let decoded = items
        .iter()
        .enumerate()
        .map(|(index, item)| decode_record(index, item, source_codec, info_codec))
        .collect::<Result<Vec<_>, _>>()?;

    let before = base.len();
    for record in decoded {
        base.insert(record.source, record.previous, record.date, record.info)?;
    }

    info!(
        records = items.len(),
        added = base.len() - before,
        resolved = base.resolved_len(),
        "loaded commit history"
    );
    if base.pending_len() > 0 {
        warn!(
            pending = base.pending_len(),
            missing = base.missing_ancestors().len(),
            "history has commits waiting on missing ancestors"
        );
    }
    Ok(base)
}

/// Rebuild a repository from a text blob written by [`to_json_string`].
///
/// # Errors
///
/// [`RepoError::UnreadableHistory`] if the text is not JSON, otherwise as
/// [`deserialize`].
pub fn from_json_str<S, I>(
    text: &str,
    source_codec: &dyn PayloadCodec<S>,
    info_codec: &dyn PayloadCodec<I>,
) -> Result<Repository<S, I>, RepoError>
where
    S: Serialize,
    I: Serialize,
{
    let value: Value = serde_json::from_str(text).map_err(RepoError::UnreadableHistory)?;
    deserialize(&value, source_codec, info_codec)
}

struct DecodedRecord<S, I> {
    source: S,
    previous: BTreeSet<CommitId>,
    date: i64,
    info: I,
}

fn decode_record<S, I>(
    index: usize,
    item: &Value,
    source_codec: &dyn PayloadCodec<S>,
    info_codec: &dyn PayloadCodec<I>,
) -> Result<DecodedRecord<S, I>, RepoError> {
    let Value::Object(fields) = item else {
        return Err(malformed(index, "record is not an object"));
    };

    let previous = match required(index, fields, "previous")? {
        Value::Array(ids) => ids
            .iter()
            .map(|raw| {
                raw.as_str()
                    .ok_or_else(|| malformed(index, "`previous` entries must be strings"))
                    .and_then(|s| {
                        CommitId::parse(s).map_err(|e| malformed(index, &e.to_string()))
                    })
            })
            .collect::<Result<BTreeSet<_>, _>>()?,
        _ => return Err(malformed(index, "`previous` must be a list")),
    };
    if previous.len() > MAX_PARENTS {
        return Err(malformed(
            index,
            &format!(
                "{} parents declared, at most {MAX_PARENTS} are allowed",
                previous.len()
            ),
        ));
    }

    let date = required(index, fields, "date")?
        .as_i64()
        .ok_or_else(|| malformed(index, "`date` must be an integer"))?;

    let source = source_codec
        .decode(required(index, fields, "source")?)
        .map_err(|e| malformed(index, &format!("`source`: {e}")))?;
    let info = info_codec
        .decode(required(index, fields, "info")?)
        .map_err(|e| malformed(index, &format!("`info`: {e}")))?;

    Ok(DecodedRecord {
        source,
        previous,
        date,
        info,
    })
}

fn required<'a>(
    index: usize,
    fields: &'a Map<String, Value>,
    name: &str,
) -> Result<&'a Value, RepoError> {
    fields
        .get(name)
        .ok_or_else(|| malformed(index, &format!("missing field `{name}`")))
}

fn malformed(index: usize, reason: &str) -> RepoError {
    RepoError::MalformedRecord {
        index,
        reason: reason.to_owned(),
    }
}
