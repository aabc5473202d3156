//! The tree engine: mutations, traversal, path resolution and metrics over
//! a storage backend.
//!
//! The engine validates preconditions, delegates storage access to a
//! [`TreeStore`] and returns results conforming to the data model. Mutations
//! on one thread are serialized behind a per-thread writer lock; reads bypass
//! the lock and rely on the backend's snapshot guarantee.
//!
//! The structure is a tree, not a general graph: every message has exactly
//! one parent, so path extraction walks the parent chain in O(path length)
//! rather than running a shortest-path search.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::TreeError;
use crate::store::TreeStore;
use crate::types::{Message, MessageId, ParentRef, Thread, ThreadId, ThreadRoot, ThreadTree, Triple};

/// Minimum accepted `GetChildren` depth.
pub const DEPTH_MIN: u32 = 1;
/// Maximum accepted `GetChildren` depth.
pub const DEPTH_MAX: u32 = 10;
/// Maximum hops a pick walk will climb before giving up.
pub const PICK_MAX_HOPS: usize = 40;

/// Outcome of a delete operation.
///
/// Deleting a subtree that holds the latest message leaves the thread with
/// no latest message; the outcome records that so the caller can
/// re-designate one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion {
    /// Number of messages removed.
    pub removed: u32,
    /// True when the latest message was inside the deleted subtree and the
    /// thread now has no latest message.
    pub cleared_latest: bool,
    /// Message promoted to latest, when configured to do so.
    pub promoted_latest: Option<MessageId>,
}

/// Tree engine generic over its storage backend.
///
/// Holds only in-flight operation context; all durable state belongs to the
/// store. Clone-cheap via `Arc` on the store; the engine itself is usually
/// shared behind an `Arc` as well.
pub struct TreeEngine<S: TreeStore> {
    store: Arc<S>,
    config: EngineConfig,
    /// One async mutex per thread id, serializing structural mutations.
    /// Entries are never reaped; the map is bounded by the number of threads
    /// a process has written to.
    writers: parking_lot::Mutex<HashMap<ThreadId, Arc<AsyncMutex<()>>>>,
}

impl<S: TreeStore> TreeEngine<S> {
    /// Create an engine with default configuration.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Create an engine with explicit configuration.
    pub fn with_config(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            writers: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Check backend reachability.
    pub async fn ping(&self) -> Result<(), TreeError> {
        self.store.ping().await
    }

    fn writer(&self, thread: &ThreadId) -> Arc<AsyncMutex<()>> {
        self.writers
            .lock()
            .entry(thread.clone())
            .or_default()
            .clone()
    }

    // ── Mutation engine ─────────────────────────────────────────────────

    /// Attach `child` under `parent`, or under the ThreadRoot when `parent`
    /// is absent.
    ///
    /// The child is always inserted with the `latest` flag cleared; the flag
    /// moves only through [`TreeEngine::set_latest_message`]. Re-adding a
    /// message under its existing parent is a no-op; re-adding it under a
    /// different parent is rejected, since messages are never re-parented
    /// implicitly.
    ///
    /// Returns the local thread context: the parent message (when the parent
    /// is not the root) followed by the child.
    pub async fn add_message(
        &self,
        thread: &ThreadId,
        child: Message,
        parent: Option<&MessageId>,
    ) -> Result<Thread, TreeError> {
        if child.id.is_empty() {
            return Err(TreeError::InvalidArgument(
                "message to be inserted cannot be empty".to_string(),
            ));
        }

        let lock = self.writer(thread);
        let _guard = lock.lock().await;

        let parent_ref = ParentRef::from_option(parent.cloned());
        let parent_msg = match parent {
            Some(id) => Some(
                self.store
                    .get_message(thread, id)
                    .await?
                    .ok_or_else(|| TreeError::ParentNotFound(id.to_string()))?,
            ),
            None => {
                if !self.store.root_exists(thread).await? {
                    return Err(TreeError::ParentNotFound(format!(
                        "thread {thread} has no root"
                    )));
                }
                None
            }
        };

        let inserted = Message::new(child.id.clone());
        match self.store.parent_of(thread, &inserted.id).await? {
            Some(existing) if existing == parent_ref => {
                // Idempotent re-add under the same parent.
                debug!(%thread, child = %inserted.id, "message already attached, no-op");
            }
            Some(_) => {
                return Err(TreeError::InvalidArgument(format!(
                    "message {} already exists under a different parent",
                    inserted.id
                )));
            }
            None => {
                self.store
                    .insert_child(thread, &parent_ref, inserted.clone())
                    .await?;
                debug!(%thread, child = %inserted.id, parent = parent_ref.start_id(), "message attached");
            }
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(p) = parent_msg {
            messages.push(p);
        }
        messages.push(inserted);
        Ok(Thread::new(messages))
    }

    /// Bulk-load an entire validated tree. Atomic and idempotent: loading
    /// the same tree twice yields the same persisted state as loading it
    /// once. Messages already present keep their existing parent; a bulk
    /// load never re-parents.
    pub async fn add_tree(&self, thread: &ThreadId, tree: &ThreadTree) -> Result<(), TreeError> {
        tree.validate(thread)?;

        let lock = self.writer(thread);
        let _guard = lock.lock().await;

        self.store.put_tree(tree).await?;
        info!(%thread, messages = tree.messages.len(), relations = tree.relations.len(), "tree loaded");
        Ok(())
    }

    /// Remove `target` and its entire subtree; with no target, remove the
    /// whole thread including its ThreadRoot.
    pub async fn delete(
        &self,
        thread: &ThreadId,
        target: Option<&MessageId>,
    ) -> Result<Deletion, TreeError> {
        let lock = self.writer(thread);
        let _guard = lock.lock().await;

        match target {
            None => {
                let snapshot = self
                    .store
                    .snapshot(thread)
                    .await?
                    .ok_or_else(|| TreeError::thread_not_found(thread))?;
                let removed = snapshot.size();
                let had_latest = snapshot.latest().is_some();
                self.store.remove_thread(thread).await?;
                info!(%thread, removed, "thread deleted");
                Ok(Deletion {
                    removed,
                    cleared_latest: had_latest,
                    promoted_latest: None,
                })
            }
            Some(id) => {
                self.store
                    .get_message(thread, id)
                    .await?
                    .ok_or_else(|| TreeError::message_not_found(id))?;

                let parent = self.store.parent_of(thread, id).await?;
                let subtree = self.collect_subtree(thread, id).await?;
                let latest_inside = match self.store.latest_message(thread).await? {
                    Some(latest) => subtree.contains(&latest.id),
                    None => false,
                };

                self.store.remove_messages(thread, &subtree).await?;

                let promoted = if latest_inside && self.config.promote_latest_on_delete {
                    match parent {
                        Some(ParentRef::Message(parent_id)) => {
                            self.store.set_latest(thread, &parent_id).await?;
                            Some(parent_id)
                        }
                        _ => None,
                    }
                } else {
                    None
                };

                info!(%thread, anchor = %id, removed = subtree.len(), "subtree deleted");
                Ok(Deletion {
                    removed: subtree.len() as u32,
                    cleared_latest: latest_inside && promoted.is_none(),
                    promoted_latest: promoted,
                })
            }
        }
    }

    /// Designate `id` as the thread's latest message. The previous latest
    /// flag is cleared in the same atomic store operation.
    pub async fn set_latest_message(
        &self,
        thread: &ThreadId,
        id: &MessageId,
    ) -> Result<Message, TreeError> {
        let lock = self.writer(thread);
        let _guard = lock.lock().await;

        self.store
            .get_message(thread, id)
            .await?
            .ok_or_else(|| TreeError::message_not_found(id))?;
        let updated = self.store.set_latest(thread, id).await?;
        debug!(%thread, latest = %id, "latest message set");
        Ok(updated)
    }

    /// The thread's current latest message.
    pub async fn get_latest_message(&self, thread: &ThreadId) -> Result<Message, TreeError> {
        self.store
            .latest_message(thread)
            .await?
            .ok_or_else(|| TreeError::NotFound(format!("thread {thread} has no latest message")))
    }

    // ── Traversal engine ────────────────────────────────────────────────

    /// The full tree for a thread. A ThreadRoot with no messages or no
    /// relations is considered non-existent for query purposes.
    pub async fn get(&self, thread: &ThreadId) -> Result<ThreadTree, TreeError> {
        let tree = self
            .store
            .snapshot(thread)
            .await?
            .ok_or_else(|| TreeError::thread_not_found(thread))?;
        if tree.messages.is_empty() || tree.relations.is_empty() {
            return Err(TreeError::thread_not_found(thread));
        }
        Ok(tree)
    }

    /// The subtree rooted at `anchor` (or at the ThreadRoot when absent),
    /// bounded in edges from the anchor.
    ///
    /// `depth` must lie in `[1, 10]`. Note the edge-count convention:
    /// `depth = 1` is normalized to a bound of two edges, so it returns the
    /// anchor's children *and* grandchildren (see
    /// [`EngineConfig::depth_one_includes_grandchildren`]). An anchor with no
    /// children resolves to no tree and yields `NotFound`.
    pub async fn get_children(
        &self,
        thread: &ThreadId,
        anchor: Option<&MessageId>,
        depth: u32,
    ) -> Result<ThreadTree, TreeError> {
        if !(DEPTH_MIN..=DEPTH_MAX).contains(&depth) {
            return Err(TreeError::InvalidArgument(format!(
                "depth must be between {DEPTH_MIN} and {DEPTH_MAX}, got {depth}"
            )));
        }
        let bound = if depth == 1 && self.config.depth_one_includes_grandchildren {
            2
        } else {
            depth
        };

        let mut messages: Vec<Message> = Vec::new();
        let start = match anchor {
            Some(id) => {
                let msg = self
                    .store
                    .get_message(thread, id)
                    .await?
                    .ok_or_else(|| TreeError::message_not_found(id))?;
                messages.push(msg);
                ParentRef::Message(id.clone())
            }
            None => {
                if !self.store.root_exists(thread).await? {
                    return Err(TreeError::thread_not_found(thread));
                }
                ParentRef::Root
            }
        };

        let mut relations: Vec<Triple> = Vec::new();
        let mut queue: VecDeque<(ParentRef, u32)> = VecDeque::new();
        queue.push_back((start, 0));
        while let Some((node, dist)) = queue.pop_front() {
            if dist == bound {
                continue;
            }
            for child_id in self.store.children_of(thread, &node).await? {
                if let Some(child) = self.store.get_message(thread, &child_id).await? {
                    relations.push(Triple::child(node.clone(), child_id.clone()));
                    messages.push(child);
                    queue.push_back((ParentRef::Message(child_id), dist + 1));
                }
            }
        }

        if messages.is_empty() || relations.is_empty() {
            return Err(TreeError::NotFound(format!(
                "no subtree found in thread {thread}"
            )));
        }
        let mut tree = ThreadTree::new(ThreadRoot::new(thread.clone()), messages, relations);
        tree.normalize();
        Ok(tree)
    }

    // ── Path resolver ───────────────────────────────────────────────────

    /// The unique directed path between two nodes, root-to-leaf order.
    ///
    /// `a` absent starts the path at the ThreadRoot (which is excluded from
    /// the result); `b` absent ends it at the thread's latest message. Both
    /// endpoints are included when they are messages. Paths run strictly
    /// parent-to-descendant; anything else is `NoPath`.
    ///
    /// Exploits the single-parent invariant: climbs the ancestor chain from
    /// `b`, one constant-size lookup per hop, capped at [`PICK_MAX_HOPS`].
    pub async fn pick(
        &self,
        thread: &ThreadId,
        a: Option<&MessageId>,
        b: Option<&MessageId>,
    ) -> Result<Thread, TreeError> {
        let end = match b {
            Some(id) => self
                .store
                .get_message(thread, id)
                .await?
                .ok_or_else(|| TreeError::message_not_found(id))?,
            None => self
                .store
                .latest_message(thread)
                .await?
                .ok_or_else(|| {
                    TreeError::NotFound(format!("thread {thread} has no latest message"))
                })?,
        };
        let start = match a {
            Some(id) => Some(
                self.store
                    .get_message(thread, id)
                    .await?
                    .ok_or_else(|| TreeError::message_not_found(id))?,
            ),
            None => {
                if !self.store.root_exists(thread).await? {
                    return Err(TreeError::thread_not_found(thread));
                }
                None
            }
        };

        let no_path = || TreeError::NoPath {
            from: start
                .as_ref()
                .map(|m| m.id.to_string())
                .unwrap_or_else(|| "root".to_string()),
            to: end.id.to_string(),
        };

        // A node is not its own descendant.
        if let Some(ref s) = start {
            if s.id == end.id {
                return Err(no_path());
            }
        }

        let mut path: Vec<Message> = vec![end.clone()];
        let mut cursor = end.id.clone();
        loop {
            if path.len() > PICK_MAX_HOPS {
                return Err(no_path());
            }
            match self.store.parent_of(thread, &cursor).await? {
                None => return Err(no_path()),
                Some(ParentRef::Root) => match start {
                    // Reached the top; the ThreadRoot itself is excluded.
                    None => break,
                    Some(_) => return Err(no_path()),
                },
                Some(ParentRef::Message(parent_id)) => {
                    if let Some(ref s) = start {
                        if s.id == parent_id {
                            path.push(s.clone());
                            break;
                        }
                    }
                    let parent = self
                        .store
                        .get_message(thread, &parent_id)
                        .await?
                        .ok_or_else(|| no_path())?;
                    path.push(parent);
                    cursor = parent_id;
                }
            }
        }

        path.reverse();
        Ok(Thread::new(path))
    }

    // ── Metrics engine ──────────────────────────────────────────────────

    /// Count of messages reachable from the ThreadRoot (the root itself is
    /// not counted).
    pub async fn size(&self, thread: &ThreadId) -> Result<u32, TreeError> {
        Ok(self.snapshot_required(thread).await?.size())
    }

    /// Count of leaf messages.
    pub async fn breadth(&self, thread: &ThreadId) -> Result<u32, TreeError> {
        Ok(self.snapshot_required(thread).await?.breadth())
    }

    /// Edge count of the longest root-to-leaf path.
    pub async fn depth(&self, thread: &ThreadId) -> Result<u32, TreeError> {
        Ok(self.snapshot_required(thread).await?.depth())
    }

    /// Out-degree of `anchor`, or of the ThreadRoot when absent.
    pub async fn degree(
        &self,
        thread: &ThreadId,
        anchor: Option<&MessageId>,
    ) -> Result<u32, TreeError> {
        let parent = match anchor {
            Some(id) => {
                self.store
                    .get_message(thread, id)
                    .await?
                    .ok_or_else(|| TreeError::message_not_found(id))?;
                ParentRef::Message(id.clone())
            }
            None => {
                if !self.store.root_exists(thread).await? {
                    return Err(TreeError::thread_not_found(thread));
                }
                ParentRef::Root
            }
        };
        Ok(self.store.children_of(thread, &parent).await?.len() as u32)
    }

    // ── Internals ───────────────────────────────────────────────────────

    async fn snapshot_required(&self, thread: &ThreadId) -> Result<ThreadTree, TreeError> {
        self.store
            .snapshot(thread)
            .await?
            .ok_or_else(|| TreeError::thread_not_found(thread))
    }

    /// Collect `anchor` and all its descendants, breadth-first.
    async fn collect_subtree(
        &self,
        thread: &ThreadId,
        anchor: &MessageId,
    ) -> Result<Vec<MessageId>, TreeError> {
        let mut collected: Vec<MessageId> = Vec::new();
        let mut seen: BTreeSet<MessageId> = BTreeSet::new();
        let mut queue: VecDeque<MessageId> = VecDeque::new();
        queue.push_back(anchor.clone());
        seen.insert(anchor.clone());
        while let Some(id) = queue.pop_front() {
            let children = self
                .store
                .children_of(thread, &ParentRef::Message(id.clone()))
                .await?;
            collected.push(id);
            for child in children {
                if seen.insert(child.clone()) {
                    queue.push_back(child);
                }
            }
        }
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTreeStore;

    fn thread() -> ThreadId {
        ThreadId::new("t1")
    }

    /// root -> a -> b -> c
    ///       \
    ///        d
    fn chain_tree() -> ThreadTree {
        ThreadTree::new(
            ThreadRoot::new("t1"),
            vec![
                Message::new("a"),
                Message::new("b"),
                Message::latest("c"),
                Message::new("d"),
            ],
            vec![
                Triple::from_root("a"),
                Triple::from_root("d"),
                Triple::child(ParentRef::Message(MessageId::new("a")), "b"),
                Triple::child(ParentRef::Message(MessageId::new("b")), "c"),
            ],
        )
    }

    async fn engine() -> TreeEngine<InMemoryTreeStore> {
        let engine = TreeEngine::new(Arc::new(InMemoryTreeStore::new()));
        engine.add_tree(&thread(), &chain_tree()).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn add_message_under_root_and_parent() {
        let engine = engine().await;
        let ctx = engine
            .add_message(&thread(), Message::new("e"), None)
            .await
            .unwrap();
        assert_eq!(ctx.ids(), vec![&MessageId::new("e")]);

        let ctx = engine
            .add_message(&thread(), Message::new("f"), Some(&MessageId::new("e")))
            .await
            .unwrap();
        assert_eq!(ctx.ids(), vec![&MessageId::new("e"), &MessageId::new("f")]);
        assert_eq!(engine.size(&thread()).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn add_message_missing_parent_fails() {
        let engine = engine().await;
        let err = engine
            .add_message(&thread(), Message::new("x"), Some(&MessageId::new("ghost")))
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::ParentNotFound(_)));

        let err = engine
            .add_message(&ThreadId::new("no_thread"), Message::new("x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::ParentNotFound(_)));
    }

    #[tokio::test]
    async fn add_message_rejects_empty_and_reparenting() {
        let engine = engine().await;
        let err = engine
            .add_message(&thread(), Message::new(""), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidArgument(_)));

        // "b" already hangs under "a"; attaching under "d" must fail.
        let err = engine
            .add_message(&thread(), Message::new("b"), Some(&MessageId::new("d")))
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidArgument(_)));

        // Re-adding under the same parent is a no-op.
        engine
            .add_message(&thread(), Message::new("b"), Some(&MessageId::new("a")))
            .await
            .unwrap();
        assert_eq!(engine.size(&thread()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn add_message_never_carries_the_latest_flag() {
        let engine = engine().await;
        engine
            .add_message(&thread(), Message::latest("sneaky"), None)
            .await
            .unwrap();
        let latest = engine.get_latest_message(&thread()).await.unwrap();
        assert_eq!(latest.id, MessageId::new("c"));
    }

    #[tokio::test]
    async fn add_tree_validation_errors() {
        let engine = TreeEngine::new(Arc::new(InMemoryTreeStore::new()));
        let err = engine
            .add_tree(&ThreadId::new("other"), &chain_tree())
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::Validation(_)));

        let empty = ThreadTree::new(ThreadRoot::new("t1"), vec![], vec![]);
        let err = engine.add_tree(&thread(), &empty).await.unwrap_err();
        assert!(matches!(err, TreeError::Validation(_)));
    }

    #[tokio::test]
    async fn add_tree_is_idempotent() {
        let engine = engine().await;
        engine.add_tree(&thread(), &chain_tree()).await.unwrap();
        assert_eq!(engine.size(&thread()).await.unwrap(), 4);
        assert_eq!(engine.get(&thread()).await.unwrap().relations.len(), 4);
    }

    #[tokio::test]
    async fn add_tree_merge_keeps_a_single_parent() {
        let engine = TreeEngine::new(Arc::new(InMemoryTreeStore::new()));
        let first = ThreadTree::new(
            ThreadRoot::new("t1"),
            vec![Message::new("a")],
            vec![Triple::from_root("a")],
        );
        engine.add_tree(&thread(), &first).await.unwrap();

        // A second load that would move "a" under "b" must not leave "a"
        // with two incoming edges.
        let second = ThreadTree::new(
            ThreadRoot::new("t1"),
            vec![Message::new("a"), Message::new("b")],
            vec![
                Triple::from_root("b"),
                Triple::child(ParentRef::Message(MessageId::new("b")), "a"),
            ],
        );
        engine.add_tree(&thread(), &second).await.unwrap();

        let tree = engine.get_children(&thread(), None, 3).await.unwrap();
        tree.validate(&thread()).unwrap();
        assert_eq!(
            tree.relations,
            vec![Triple::from_root("a"), Triple::from_root("b")]
        );
    }

    #[tokio::test]
    async fn get_children_depth_one_includes_grandchildren() {
        let engine = engine().await;
        let tree = engine
            .get_children(&thread(), Some(&MessageId::new("a")), 1)
            .await
            .unwrap();
        // Anchor, child and grandchild: the documented two-edge bound.
        let ids: Vec<&str> = tree.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(tree.relations.len(), 2);
    }

    #[tokio::test]
    async fn get_children_strict_depth_when_configured() {
        let store = Arc::new(InMemoryTreeStore::new());
        let engine = TreeEngine::with_config(
            store,
            EngineConfig {
                depth_one_includes_grandchildren: false,
                ..EngineConfig::default()
            },
        );
        engine.add_tree(&thread(), &chain_tree()).await.unwrap();
        let tree = engine
            .get_children(&thread(), Some(&MessageId::new("a")), 1)
            .await
            .unwrap();
        let ids: Vec<&str> = tree.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn get_children_bounds_and_leaf_anchor() {
        let engine = engine().await;
        for depth in [0, 11] {
            let err = engine
                .get_children(&thread(), None, depth)
                .await
                .unwrap_err();
            assert!(matches!(err, TreeError::InvalidArgument(_)));
        }
        // Leaf anchor resolves to no subtree.
        let err = engine
            .get_children(&thread(), Some(&MessageId::new("c")), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::NotFound(_)));
    }

    #[tokio::test]
    async fn pick_between_messages_includes_both_endpoints() {
        let engine = engine().await;
        let path = engine
            .pick(&thread(), Some(&MessageId::new("a")), Some(&MessageId::new("c")))
            .await
            .unwrap();
        assert_eq!(
            path.ids(),
            vec![&MessageId::new("a"), &MessageId::new("b"), &MessageId::new("c")]
        );
    }

    #[tokio::test]
    async fn pick_defaults_to_root_and_latest() {
        let engine = engine().await;
        let path = engine.pick(&thread(), None, None).await.unwrap();
        assert_eq!(
            path.ids(),
            vec![&MessageId::new("a"), &MessageId::new("b"), &MessageId::new("c")]
        );
        assert!(path.messages.last().unwrap().latest);
    }

    #[tokio::test]
    async fn pick_no_path_cases() {
        let engine = engine().await;
        // Sibling branches are not connected.
        let err = engine
            .pick(&thread(), Some(&MessageId::new("d")), Some(&MessageId::new("c")))
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::NoPath { .. }));

        // Ascending direction is not a path.
        let err = engine
            .pick(&thread(), Some(&MessageId::new("c")), Some(&MessageId::new("a")))
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::NoPath { .. }));

        // A node is not its own descendant.
        let err = engine
            .pick(&thread(), Some(&MessageId::new("b")), Some(&MessageId::new("b")))
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::NoPath { .. }));
    }

    #[tokio::test]
    async fn pick_missing_endpoint_is_not_found() {
        let engine = engine().await;
        let err = engine
            .pick(&thread(), None, Some(&MessageId::new("ghost")))
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_subtree_reports_latest_cleared() {
        let engine = engine().await;
        let outcome = engine
            .delete(&thread(), Some(&MessageId::new("b")))
            .await
            .unwrap();
        assert_eq!(outcome.removed, 2); // b and c
        assert!(outcome.cleared_latest);
        assert_eq!(outcome.promoted_latest, None);
        assert_eq!(engine.size(&thread()).await.unwrap(), 2);
        assert!(matches!(
            engine.get_latest_message(&thread()).await.unwrap_err(),
            TreeError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn delete_promotes_parent_when_configured() {
        let engine = TreeEngine::with_config(
            Arc::new(InMemoryTreeStore::new()),
            EngineConfig {
                promote_latest_on_delete: true,
                ..EngineConfig::default()
            },
        );
        engine.add_tree(&thread(), &chain_tree()).await.unwrap();
        let outcome = engine
            .delete(&thread(), Some(&MessageId::new("b")))
            .await
            .unwrap();
        assert!(!outcome.cleared_latest);
        assert_eq!(outcome.promoted_latest, Some(MessageId::new("a")));
        let latest = engine.get_latest_message(&thread()).await.unwrap();
        assert_eq!(latest.id, MessageId::new("a"));
    }

    #[tokio::test]
    async fn delete_whole_thread() {
        let engine = engine().await;
        let outcome = engine.delete(&thread(), None).await.unwrap();
        assert_eq!(outcome.removed, 4);
        assert!(outcome.cleared_latest);
        assert!(matches!(
            engine.get(&thread()).await.unwrap_err(),
            TreeError::NotFound(_)
        ));
        assert!(matches!(
            engine.delete(&thread(), None).await.unwrap_err(),
            TreeError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn delete_missing_target_is_not_found() {
        let engine = engine().await;
        let err = engine
            .delete(&thread(), Some(&MessageId::new("ghost")))
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::NotFound(_)));
    }

    #[tokio::test]
    async fn set_latest_swaps_the_flag() {
        let engine = engine().await;
        let updated = engine
            .set_latest_message(&thread(), &MessageId::new("a"))
            .await
            .unwrap();
        assert!(updated.latest);
        let tree = engine.get(&thread()).await.unwrap();
        let flagged: Vec<&str> = tree
            .messages
            .iter()
            .filter(|m| m.latest)
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(flagged, vec!["a"]);
    }

    #[tokio::test]
    async fn metrics_on_chain_tree() {
        let engine = engine().await;
        assert_eq!(engine.size(&thread()).await.unwrap(), 4);
        assert_eq!(engine.breadth(&thread()).await.unwrap(), 2); // c and d
        assert_eq!(engine.depth(&thread()).await.unwrap(), 2); // a -> b -> c
        assert_eq!(engine.degree(&thread(), None).await.unwrap(), 2);
        assert_eq!(
            engine
                .degree(&thread(), Some(&MessageId::new("a")))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn metrics_on_missing_thread_fail() {
        let engine = engine().await;
        let missing = ThreadId::new("missing");
        assert!(engine.size(&missing).await.is_err());
        assert!(engine.breadth(&missing).await.is_err());
        assert!(engine.depth(&missing).await.is_err());
        assert!(engine.degree(&missing, None).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_mutations_on_one_thread_serialize() {
        let engine = Arc::new(engine().await);
        let mut handles = Vec::new();
        for i in 0..16 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine
                    .add_message(&thread(), Message::new(format!("m{i}")), None)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(engine.size(&thread()).await.unwrap(), 20);
    }
}
