//! Persistent key-value storage for serialized histories.
//!
//! The editor keeps its whole history as one text blob under a fixed key.
//! [`KeyValueStore`] is the seam; [`FileStore`] keeps one file per key in a
//! directory and [`MemoryStore`] keeps everything in process.
//!
//! File writes are guarded by an advisory lock next to the data file and
//! go through a temp file plus rename, so a reader never sees a torn blob.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::error::{ErrorCode, RepoError};
use crate::repo::Repository;
use crate::serial::{self, PayloadCodec};

/// Errors from a [`KeyValueStore`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("lock timed out after {waited:?} at {}", .path.display())]
    Timeout { path: PathBuf, waited: Duration },

    #[error("storage io failed at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Keys become file names, so they are restricted to `[A-Za-z0-9._-]`
    /// and may not start with a dot.
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
}

impl StorageError {
    /// Machine-readable code associated with this storage error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::Io { .. } => ErrorCode::StorageWriteFailed,
            Self::InvalidKey(_) => ErrorCode::InvalidStorageKey,
        }
    }

    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A flat string store keyed by name.
pub trait KeyValueStore {
    /// # Errors
    ///
    /// [`StorageError`] if the backing medium cannot be read.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// [`StorageError`] if the backing medium cannot be written.
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// One file per key under `dir`, named `<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    lock_timeout: Duration,
}

impl FileStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout,
        }
    }

    /// A store rooted at `config.dir`, resolved against `project_root` when
    /// relative.
    #[must_use]
    pub fn from_config(project_root: &Path, config: &StorageConfig) -> Self {
        Self::new(
            project_root.join(&config.dir),
            Duration::from_millis(config.lock_timeout_ms),
        )
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn paths(&self, key: &str) -> Result<(PathBuf, PathBuf), StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        Ok((
            self.dir.join(format!("{key}.json")),
            self.dir.join(format!("{key}.lock")),
        ))
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let (data, lock) = self.paths(key)?;
        if !self.dir.exists() {
            return Ok(None);
        }
        let _guard = LockGuard::acquire(&lock, self.lock_timeout, LockKind::Shared)?;
        match fs::read_to_string(&data) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::io(&data, err)),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let (data, lock) = self.paths(key)?;
        let _guard = LockGuard::acquire(&lock, self.lock_timeout, LockKind::Exclusive)?;

        let tmp = data.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| StorageError::io(&tmp, e))?;
        fs::rename(&tmp, &data).map_err(|e| StorageError::io(&data, e))?;
        debug!(path = %data.display(), bytes = value.len(), "stored blob");
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum LockKind {
    Shared,
    Exclusive,
}

/// Advisory lock held for the duration of one load or save.
struct LockGuard {
    file: File,
}

impl LockGuard {
    fn acquire(path: &Path, timeout: Duration, kind: LockKind) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StorageError::io(path, e))?;

        let start = Instant::now();
        loop {
            let attempt = match kind {
                LockKind::Shared => FileExt::try_lock_shared(&file),
                LockKind::Exclusive => FileExt::try_lock_exclusive(&file),
            };
            if attempt.is_ok() {
                return Ok(Self { file });
            }
            if start.elapsed() >= timeout {
                return Err(StorageError::Timeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

// ---------------------------------------------------------------------------
// Repository glue
// ---------------------------------------------------------------------------

/// Serialize `repo` and store it under `key`.
///
/// # Errors
///
/// [`RepoError::Payload`] from the codecs or [`RepoError::Storage`] from
/// the store.
pub fn save_repository<S, I>(
    store: &dyn KeyValueStore,
    key: &str,
    repo: &Repository<S, I>,
    source_codec: &dyn PayloadCodec<S>,
    info_codec: &dyn PayloadCodec<I>,
) -> Result<(), RepoError> {
    let text = serial::to_json_string(repo, source_codec, info_codec)?;
    store.save(key, &text)?;
    info!(key, commits = repo.len(), "saved commit history");
    Ok(())
}

/// Load the history stored under `key`; a missing key is an empty history.
///
/// # Errors
///
/// [`RepoError::Storage`] from the store, otherwise as
/// [`serial::from_json_str`].
pub fn load_repository<S, I>(
    store: &dyn KeyValueStore,
    key: &str,
    source_codec: &dyn PayloadCodec<S>,
    info_codec: &dyn PayloadCodec<I>,
) -> Result<Repository<S, I>, RepoError>
where
    S: Serialize,
    I: Serialize,
{
    store.load(key)?.map_or_else(
        || {
            info!(key, "no stored history, starting empty");
            Ok(Repository::new())
        },
        |text| {
            serial::from_json_str(&text, source_codec, info_codec).inspect_err(|err| {
                warn!(key, code = %err.code(), "{}", err.code().message());
            })
        },
    )
}
