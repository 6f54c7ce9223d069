//! Content-addressed commit DAG.
//!
//! The pieces here are composed by [`crate::repo::Repository`]:
//!
//! - [`store`]: append-only payload storage ([`CommitStore`]).
//! - [`reduce`]: transitive reduction of declared parents.
//! - [`graph`]: previous/next adjacency, roots and tips ([`GraphIndex`]).
//! - [`resolver`]: buffering of commits whose parents are not resolved yet
//!   and the cascade that unlocks them ([`DependencyResolver`]).
//! - [`date_order`]: timestamp ordering of resolved commits ([`DateOrder`]).
//!
//! Invariant shared by all of them: a commit is visible in the graph and the
//! date order if and only if it is resolved, and it resolves only after
//! every declared parent did. Cycles are therefore unreachable.

pub mod date_order;
pub mod graph;
pub mod reduce;
pub mod resolver;
pub mod store;

pub use date_order::DateOrder;
pub use graph::GraphIndex;
pub use reduce::{is_reachable, reduce_parents};
pub use resolver::{DependencyResolver, Submission};
pub use store::CommitStore;
