//! Tree storage backends.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::error::TreeError;
use crate::types::{Message, MessageId, ParentRef, ThreadId, ThreadTree};

/// Trait for tree storage backends.
///
/// The engine owns the algorithms; backends own the persisted node/edge set
/// and are responsible for their own locking and transaction discipline.
/// Every backend speaks the crate error taxonomy so failures surface to
/// callers unmodified.
///
/// Atomicity contract: `insert_child`, `put_tree`, `set_latest`,
/// `remove_messages` and `remove_thread` must apply entirely or not at all,
/// even when the calling future is cancelled mid-flight. `put_tree` must
/// additionally be idempotent (re-loading an identical tree is a no-op).
///
/// Read methods must observe a consistent snapshot: never a half-written
/// subtree.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Check backend reachability.
    async fn ping(&self) -> Result<(), TreeError>;

    /// Whether the ThreadRoot for `thread` exists.
    async fn root_exists(&self, thread: &ThreadId) -> Result<bool, TreeError>;

    /// Fetch a message by id.
    async fn get_message(
        &self,
        thread: &ThreadId,
        id: &MessageId,
    ) -> Result<Option<Message>, TreeError>;

    /// Parent of a message: `None` when the message is unknown,
    /// `Some(ParentRef::Root)` when it hangs off the ThreadRoot.
    async fn parent_of(
        &self,
        thread: &ThreadId,
        id: &MessageId,
    ) -> Result<Option<ParentRef>, TreeError>;

    /// Direct children of a node, ordered by message id for determinism.
    async fn children_of(
        &self,
        thread: &ThreadId,
        parent: &ParentRef,
    ) -> Result<Vec<MessageId>, TreeError>;

    /// The thread's current latest message, if one is designated.
    async fn latest_message(&self, thread: &ThreadId) -> Result<Option<Message>, TreeError>;

    /// Full tree for a thread, or `None` when the ThreadRoot does not exist.
    async fn snapshot(&self, thread: &ThreadId) -> Result<Option<ThreadTree>, TreeError>;

    /// Atomically create one message and its incoming `CHILD` edge.
    ///
    /// The parent (or root) is expected to exist; the engine checks this
    /// before calling, backends may re-check and return `ParentNotFound`.
    async fn insert_child(
        &self,
        thread: &ThreadId,
        parent: &ParentRef,
        child: Message,
    ) -> Result<(), TreeError>;

    /// Atomically persist an entire validated tree.
    ///
    /// Merge semantics: re-loading an identical tree changes nothing, and a
    /// message that already exists keeps its current parent even when the
    /// incoming tree says otherwise. Loads never re-parent.
    async fn put_tree(&self, tree: &ThreadTree) -> Result<(), TreeError>;

    /// Atomically clear every `latest` flag in the thread and set it on `id`.
    /// Returns the updated message.
    async fn set_latest(&self, thread: &ThreadId, id: &MessageId) -> Result<Message, TreeError>;

    /// Remove the given messages and every relation touching them.
    async fn remove_messages(
        &self,
        thread: &ThreadId,
        ids: &[MessageId],
    ) -> Result<(), TreeError>;

    /// Remove the entire thread including its ThreadRoot.
    async fn remove_thread(&self, thread: &ThreadId) -> Result<(), TreeError>;
}

pub use memory::InMemoryTreeStore;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresTreeStore};
