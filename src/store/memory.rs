//! In-memory tree store for testing and embedding.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::TreeError;
use crate::types::{Message, MessageId, ParentRef, ThreadId, ThreadRoot, ThreadTree, Triple};

use super::TreeStore;

/// Per-thread adjacency state.
///
/// The latest message is a single optional reference rather than a flag per
/// node, which makes latest-uniqueness structural instead of enforced by a
/// clear-then-set sweep.
#[derive(Debug, Clone, Default)]
struct ThreadState {
    messages: BTreeSet<MessageId>,
    /// Child -> parent. Exactly one entry per message.
    parents: BTreeMap<MessageId, ParentRef>,
    /// Parent -> children.
    children: BTreeMap<ParentRef, BTreeSet<MessageId>>,
    latest: Option<MessageId>,
}

impl ThreadState {
    fn message(&self, id: &MessageId) -> Option<Message> {
        self.messages.contains(id).then(|| Message {
            id: id.clone(),
            latest: self.latest.as_ref() == Some(id),
        })
    }

    fn attach(&mut self, parent: ParentRef, child: MessageId) {
        self.messages.insert(child.clone());
        self.children
            .entry(parent.clone())
            .or_default()
            .insert(child.clone());
        self.parents.insert(child, parent);
    }

    fn detach(&mut self, id: &MessageId) {
        self.messages.remove(id);
        if let Some(parent) = self.parents.remove(id) {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.remove(id);
                if siblings.is_empty() {
                    self.children.remove(&parent);
                }
            }
        }
        self.children.remove(&ParentRef::Message(id.clone()));
        if self.latest.as_ref() == Some(id) {
            self.latest = None;
        }
    }
}

/// In-memory tree store.
///
/// Uses BTreeMap/BTreeSet for deterministic iteration order; writes take a
/// single `RwLock` so every mutation is atomic and every read sees a
/// consistent snapshot.
#[derive(Debug, Default)]
pub struct InMemoryTreeStore {
    threads: RwLock<BTreeMap<ThreadId, ThreadState>>,
}

impl InMemoryTreeStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads currently stored.
    pub fn num_threads(&self) -> usize {
        self.threads.read().len()
    }
}

#[async_trait]
impl TreeStore for InMemoryTreeStore {
    async fn ping(&self) -> Result<(), TreeError> {
        Ok(())
    }

    async fn root_exists(&self, thread: &ThreadId) -> Result<bool, TreeError> {
        Ok(self.threads.read().contains_key(thread))
    }

    async fn get_message(
        &self,
        thread: &ThreadId,
        id: &MessageId,
    ) -> Result<Option<Message>, TreeError> {
        Ok(self
            .threads
            .read()
            .get(thread)
            .and_then(|state| state.message(id)))
    }

    async fn parent_of(
        &self,
        thread: &ThreadId,
        id: &MessageId,
    ) -> Result<Option<ParentRef>, TreeError> {
        Ok(self
            .threads
            .read()
            .get(thread)
            .and_then(|state| state.parents.get(id).cloned()))
    }

    async fn children_of(
        &self,
        thread: &ThreadId,
        parent: &ParentRef,
    ) -> Result<Vec<MessageId>, TreeError> {
        Ok(self
            .threads
            .read()
            .get(thread)
            .and_then(|state| state.children.get(parent))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn latest_message(&self, thread: &ThreadId) -> Result<Option<Message>, TreeError> {
        Ok(self.threads.read().get(thread).and_then(|state| {
            state.latest.as_ref().map(|id| Message {
                id: id.clone(),
                latest: true,
            })
        }))
    }

    async fn snapshot(&self, thread: &ThreadId) -> Result<Option<ThreadTree>, TreeError> {
        let threads = self.threads.read();
        let Some(state) = threads.get(thread) else {
            return Ok(None);
        };
        let messages = state
            .messages
            .iter()
            .map(|id| Message {
                id: id.clone(),
                latest: state.latest.as_ref() == Some(id),
            })
            .collect();
        let relations = state
            .parents
            .iter()
            .map(|(child, parent)| Triple::child(parent.clone(), child.clone()))
            .collect();
        let mut tree = ThreadTree::new(ThreadRoot::new(thread.clone()), messages, relations);
        tree.normalize();
        Ok(Some(tree))
    }

    async fn insert_child(
        &self,
        thread: &ThreadId,
        parent: &ParentRef,
        child: Message,
    ) -> Result<(), TreeError> {
        let mut threads = self.threads.write();
        let state = threads
            .get_mut(thread)
            .ok_or_else(|| TreeError::ParentNotFound(format!("thread {thread} has no root")))?;
        if let ParentRef::Message(parent_id) = parent {
            if !state.messages.contains(parent_id) {
                return Err(TreeError::ParentNotFound(parent_id.to_string()));
            }
        }
        let latest = child.latest;
        let id = child.id;
        state.attach(parent.clone(), id.clone());
        if latest {
            state.latest = Some(id);
        }
        Ok(())
    }

    async fn put_tree(&self, tree: &ThreadTree) -> Result<(), TreeError> {
        let mut threads = self.threads.write();
        let state = threads.entry(tree.root.thread_id.clone()).or_default();
        for t in &tree.relations {
            // Merge semantics: a message that already exists keeps its
            // current parent. Re-attaching would leave the old edge behind
            // in the children index.
            if !state.parents.contains_key(&t.end_id) {
                state.attach(t.parent(), t.end_id.clone());
            }
        }
        if let Some(latest) = tree.latest() {
            state.latest = Some(latest.id.clone());
        }
        Ok(())
    }

    async fn set_latest(&self, thread: &ThreadId, id: &MessageId) -> Result<Message, TreeError> {
        let mut threads = self.threads.write();
        let state = threads
            .get_mut(thread)
            .ok_or_else(|| TreeError::thread_not_found(thread))?;
        if !state.messages.contains(id) {
            return Err(TreeError::message_not_found(id));
        }
        state.latest = Some(id.clone());
        Ok(Message {
            id: id.clone(),
            latest: true,
        })
    }

    async fn remove_messages(
        &self,
        thread: &ThreadId,
        ids: &[MessageId],
    ) -> Result<(), TreeError> {
        let mut threads = self.threads.write();
        let state = threads
            .get_mut(thread)
            .ok_or_else(|| TreeError::thread_not_found(thread))?;
        for id in ids {
            state.detach(id);
        }
        Ok(())
    }

    async fn remove_thread(&self, thread: &ThreadId) -> Result<(), TreeError> {
        let mut threads = self.threads.write();
        threads
            .remove(thread)
            .map(|_| ())
            .ok_or_else(|| TreeError::thread_not_found(thread))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread() -> ThreadId {
        ThreadId::new("t1")
    }

    async fn seeded() -> InMemoryTreeStore {
        let store = InMemoryTreeStore::new();
        let tree = ThreadTree::new(
            ThreadRoot::new("t1"),
            vec![Message::new("a"), Message::new("b"), Message::new("c")],
            vec![
                Triple::from_root("a"),
                Triple::child(ParentRef::Message(MessageId::new("a")), "b"),
                Triple::child(ParentRef::Message(MessageId::new("a")), "c"),
            ],
        );
        store.put_tree(&tree).await.unwrap();
        store
    }

    #[tokio::test]
    async fn put_tree_then_snapshot_round_trips() {
        let store = seeded().await;
        let tree = store.snapshot(&thread()).await.unwrap().unwrap();
        assert_eq!(tree.size(), 3);
        assert_eq!(tree.relations.len(), 3);
    }

    #[tokio::test]
    async fn put_tree_is_idempotent() {
        let store = seeded().await;
        let before = store.snapshot(&thread()).await.unwrap().unwrap();
        store.put_tree(&before).await.unwrap();
        let after = store.snapshot(&thread()).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn put_tree_never_reparents_existing_messages() {
        let store = InMemoryTreeStore::new();
        let first = ThreadTree::new(
            ThreadRoot::new("t1"),
            vec![Message::new("a")],
            vec![Triple::from_root("a")],
        );
        store.put_tree(&first).await.unwrap();

        // Individually valid, but hangs the existing "a" under "b".
        let second = ThreadTree::new(
            ThreadRoot::new("t1"),
            vec![Message::new("a"), Message::new("b")],
            vec![
                Triple::from_root("b"),
                Triple::child(ParentRef::Message(MessageId::new("b")), "a"),
            ],
        );
        store.put_tree(&second).await.unwrap();

        // "a" keeps its original parent and no stale edge survives.
        assert_eq!(
            store.parent_of(&thread(), &MessageId::new("a")).await.unwrap(),
            Some(ParentRef::Root)
        );
        assert!(store
            .children_of(&thread(), &ParentRef::Message(MessageId::new("b")))
            .await
            .unwrap()
            .is_empty());
        let snap = store.snapshot(&thread()).await.unwrap().unwrap();
        assert_eq!(
            snap.relations,
            vec![Triple::from_root("a"), Triple::from_root("b")]
        );
    }

    #[tokio::test]
    async fn children_are_ordered() {
        let store = seeded().await;
        let kids = store
            .children_of(&thread(), &ParentRef::Message(MessageId::new("a")))
            .await
            .unwrap();
        assert_eq!(kids, vec![MessageId::new("b"), MessageId::new("c")]);
    }

    #[tokio::test]
    async fn insert_child_requires_parent() {
        let store = seeded().await;
        let err = store
            .insert_child(
                &thread(),
                &ParentRef::Message(MessageId::new("ghost")),
                Message::new("d"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::ParentNotFound(_)));
    }

    #[tokio::test]
    async fn set_latest_moves_the_pointer() {
        let store = seeded().await;
        store.set_latest(&thread(), &MessageId::new("b")).await.unwrap();
        store.set_latest(&thread(), &MessageId::new("c")).await.unwrap();

        let latest = store.latest_message(&thread()).await.unwrap().unwrap();
        assert_eq!(latest.id, MessageId::new("c"));

        // Only one message may carry the flag.
        let snap = store.snapshot(&thread()).await.unwrap().unwrap();
        assert_eq!(snap.messages.iter().filter(|m| m.latest).count(), 1);
    }

    #[tokio::test]
    async fn removing_latest_clears_the_pointer() {
        let store = seeded().await;
        store.set_latest(&thread(), &MessageId::new("c")).await.unwrap();
        store
            .remove_messages(&thread(), &[MessageId::new("c")])
            .await
            .unwrap();
        assert!(store.latest_message(&thread()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_thread_drops_everything() {
        let store = seeded().await;
        store.remove_thread(&thread()).await.unwrap();
        assert!(!store.root_exists(&thread()).await.unwrap());
        assert!(matches!(
            store.remove_thread(&thread()).await.unwrap_err(),
            TreeError::NotFound(_)
        ));
    }
}
