use std::fmt;

use crate::commit::CommitId;
use crate::storage::StorageError;

/// Machine-readable error codes for editor-side decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidStorageKey,
    TooManyParents,
    UnknownCommit,
    UnsupportedOperation,
    MalformedRecord,
    PayloadCodecFailed,
    StorageWriteFailed,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidStorageKey => "E1002",
            Self::TooManyParents => "E2001",
            Self::UnknownCommit => "E2002",
            Self::UnsupportedOperation => "E2003",
            Self::MalformedRecord => "E3001",
            Self::PayloadCodecFailed => "E3002",
            Self::StorageWriteFailed => "E5001",
            Self::LockContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and status lines.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidStorageKey => "Storage key is not a valid file name",
            Self::TooManyParents => "Too many parent commits",
            Self::UnknownCommit => "Commit is not resolved in this history",
            Self::UnsupportedOperation => "Operation is not supported",
            Self::MalformedRecord => "Malformed persisted commit record",
            Self::PayloadCodecFailed => "Payload encode/decode failed",
            Self::StorageWriteFailed => "History storage write failed",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to the editor.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidStorageKey => {
                Some("Use only letters, digits, '.', '_' or '-' in storage.key.")
            }
            Self::TooManyParents => Some("Merge at most 8 branches in a single commit."),
            Self::UnknownCommit => Some("Only query ids returned by `add` or by iteration."),
            Self::UnsupportedOperation => Some("Commits are append-only and cannot be removed."),
            Self::MalformedRecord => {
                Some("The stored history is corrupt; restore it from a backup copy.")
            }
            Self::PayloadCodecFailed => None,
            Self::StorageWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other editor releases its lock."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Every failure the commit repository can surface to its caller.
///
/// None of these are retried internally. A commit whose ancestor never
/// arrives is not an error; it stays visible through
/// [`Repository::pending`](crate::repo::Repository::pending).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// A commit declared more parents than [`MAX_PARENTS`](crate::commit::MAX_PARENTS).
    #[error("commit declares {count} parents, at most {max} are allowed")]
    TooManyParents { count: usize, max: usize },

    /// The id is not a resolved commit of this repository.
    #[error("unknown commit {0}")]
    UnknownCommit(CommitId),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// A persisted record is missing a field or has the wrong shape.
    #[error("malformed record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    /// A pluggable payload codec rejected a value.
    #[error("payload codec failed: {0}")]
    Payload(String),

    /// A payload has no JSON representation, so it cannot be hashed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The stored history text is not JSON at all.
    #[error("stored history is not valid json: {0}")]
    UnreadableHistory(#[source] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RepoError {
    /// Return the machine-readable error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::TooManyParents { .. } => ErrorCode::TooManyParents,
            Self::UnknownCommit(_) => ErrorCode::UnknownCommit,
            Self::UnsupportedOperation(_) => ErrorCode::UnsupportedOperation,
            Self::MalformedRecord { .. } | Self::UnreadableHistory(_) => {
                ErrorCode::MalformedRecord
            }
            Self::Payload(_) => ErrorCode::PayloadCodecFailed,
            Self::Json(_) => ErrorCode::InternalUnexpected,
            Self::Storage(err) => err.code(),
        }
    }

    /// Optional remediation hint for the editor.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
