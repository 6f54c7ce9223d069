//! strata-core library.
//!
//! The content-addressed commit repository behind the strata editor's undo
//! history and branching commit log. Source snapshots and commit metadata
//! are opaque: the editor supplies them together with their serializers,
//! and this crate hashes, orders and persists them.
//!
//! - [`commit`]: ids, records and content hashing.
//! - [`dag`]: storage, reduction, adjacency, resolution and date order.
//! - [`repo`]: the [`Repository`] value tying them together.
//! - [`serial`]: round-trip through plain JSON records.
//! - [`storage`]: key-value persistence of the serialized history.
//!
//! # Conventions
//!
//! - **Errors**: library operations return [`RepoError`]; `anyhow::Result`
//!   is used only while loading configuration.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).

pub mod clock;
pub mod commit;
pub mod config;
pub mod dag;
pub mod error;
pub mod repo;
pub mod serial;
pub mod storage;

pub use commit::{CommitId, CommitRecord, MAX_PARENTS};
pub use error::{ErrorCode, RepoError};
pub use repo::Repository;
