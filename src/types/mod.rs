//! Core types for the tree engine.

pub mod message;
pub mod tree;
pub mod triple;

pub use message::{Message, MessageId, ThreadId, ThreadRoot};
pub use tree::{Thread, ThreadTree};
pub use triple::{ParentRef, RelationKind, Triple};
