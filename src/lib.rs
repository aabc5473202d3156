//! # arbor-thread
//!
//! A conversation thread modeled as a rooted tree of messages, with a
//! backend-agnostic engine for creating, querying and mutating that tree.
//!
//! ## Core Contract
//!
//! 1. One `ThreadRoot` per thread; messages form a tree under it via
//!    directed `CHILD` relations (single parent, no cycles)
//! 2. At most one message per thread carries the `latest` flag
//! 3. Every operation behaves identically no matter which storage backend
//!    realizes it
//!
//! ## Architecture
//!
//! ```text
//! Caller → TreeEngine (validate, traverse, pick, metrics)
//!               ↓
//!          TreeStore (Postgres or Memory)
//! ```
//!
//! ## Boundary Semantics
//!
//! - `get_children` with `depth = 1` traverses **two** edges from the anchor
//!   (children plus grandchildren); this is the contract's edge-count
//!   convention, configurable via [`EngineConfig`]
//! - `pick` climbs the single-parent ancestor chain in O(path length);
//!   there is no general shortest-path search anywhere in the crate
//! - deleting a subtree that holds the latest message leaves the thread
//!   with no latest message unless promotion is configured

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod demo;
pub mod engine;
pub mod error;
pub mod store;
pub mod types;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use config::EngineConfig;
pub use engine::{Deletion, TreeEngine, DEPTH_MAX, DEPTH_MIN, PICK_MAX_HOPS};
pub use error::TreeError;
pub use store::{InMemoryTreeStore, TreeStore};
#[cfg(feature = "postgres")]
pub use store::{PostgresConfig, PostgresTreeStore};
pub use types::{
    Message, MessageId, ParentRef, RelationKind, Thread, ThreadId, ThreadRoot, ThreadTree, Triple,
};

// Service re-exports (when the service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Schema version for all wire types.
/// Increment on breaking changes to any serialized shape.
pub const TREE_SCHEMA_VERSION: &str = "1.0.0";
