//! Thread and tree aggregates.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::message::{Message, MessageId, ThreadId, ThreadRoot};
use super::triple::{ParentRef, Triple};
use crate::error::TreeError;

/// An ordered sequence of messages representing one path through the tree,
/// root-to-leaf. Return type of path-based queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Thread {
    /// Path messages in root-to-leaf order.
    pub messages: Vec<Message>,
}

impl Thread {
    /// Wrap a message sequence.
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Path length in messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when the path holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Message ids in path order.
    pub fn ids(&self) -> Vec<&MessageId> {
        self.messages.iter().map(|m| &m.id).collect()
    }
}

/// Aggregate of one ThreadRoot, a set of messages and a set of relations.
///
/// Represents either a whole thread or a bounded subtree. Structural
/// invariants are enforced by [`ThreadTree::validate`] before bulk loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadTree {
    /// The thread's anchor node.
    pub root: ThreadRoot,
    /// Messages in the tree.
    pub messages: Vec<Message>,
    /// Directed `CHILD` edges.
    pub relations: Vec<Triple>,
}

impl ThreadTree {
    /// Create a tree aggregate.
    pub fn new(root: ThreadRoot, messages: Vec<Message>, relations: Vec<Triple>) -> Self {
        Self {
            root,
            messages,
            relations,
        }
    }

    /// Number of messages (the ThreadRoot is not counted).
    pub fn size(&self) -> u32 {
        self.messages.len() as u32
    }

    /// Look up a message by id.
    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// The message carrying the `latest` flag, if any.
    pub fn latest(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.latest)
    }

    /// Parent of a message, or `None` when the message has no incoming edge
    /// in this aggregate.
    pub fn parent_of(&self, id: &MessageId) -> Option<ParentRef> {
        self.relations
            .iter()
            .find(|t| &t.end_id == id)
            .map(|t| t.parent())
    }

    /// Children grouped by parent, each list ordered by message id.
    pub fn children_index(&self) -> BTreeMap<ParentRef, Vec<MessageId>> {
        let mut index: BTreeMap<ParentRef, Vec<MessageId>> = BTreeMap::new();
        for t in &self.relations {
            index.entry(t.parent()).or_default().push(t.end_id.clone());
        }
        for children in index.values_mut() {
            children.sort();
        }
        index
    }

    /// Count of leaf messages (no outgoing `CHILD` edge).
    pub fn breadth(&self) -> u32 {
        let parents: BTreeSet<&str> = self
            .relations
            .iter()
            .filter(|t| !t.starts_at_root())
            .map(|t| t.start_id.as_str())
            .collect();
        self.messages
            .iter()
            .filter(|m| !parents.contains(m.id.as_str()))
            .count() as u32
    }

    /// Edge count of the longest root-to-leaf path, measured along messages:
    /// a top-level message sits at depth 0.
    pub fn depth(&self) -> u32 {
        let index = self.children_index();
        let mut max_depth = 0u32;
        let mut queue: VecDeque<(MessageId, u32)> = VecDeque::new();
        if let Some(top) = index.get(&ParentRef::Root) {
            for id in top {
                queue.push_back((id.clone(), 0));
            }
        }
        let mut seen: BTreeSet<MessageId> = BTreeSet::new();
        while let Some((id, depth)) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            max_depth = max_depth.max(depth);
            if let Some(children) = index.get(&ParentRef::Message(id)) {
                for child in children {
                    queue.push_back((child.clone(), depth + 1));
                }
            }
        }
        max_depth
    }

    /// Out-degree of a node.
    pub fn degree(&self, parent: &ParentRef) -> u32 {
        self.relations
            .iter()
            .filter(|t| &t.parent() == parent)
            .count() as u32
    }

    /// Sort messages and relations into canonical order.
    ///
    /// Query results are normalized before they are returned so identical
    /// trees compare equal regardless of backend iteration order.
    pub fn normalize(&mut self) {
        self.messages.sort_by(|a, b| a.id.cmp(&b.id));
        self.relations.sort();
    }

    /// Check the structural invariants required of a bulk load:
    /// the root id matches `thread`, the tree is non-empty, ids are unique,
    /// relations only reference known messages, every message has exactly one
    /// incoming edge, at most one message is latest, and no cycles exist.
    pub fn validate(&self, thread: &ThreadId) -> Result<(), TreeError> {
        if &self.root.thread_id != thread {
            return Err(TreeError::Validation(format!(
                "tree root {} does not match thread {thread}",
                self.root.thread_id
            )));
        }
        if self.messages.is_empty() {
            return Err(TreeError::Validation("tree has no messages".to_string()));
        }
        if self.relations.is_empty() {
            return Err(TreeError::Validation("tree has no relations".to_string()));
        }

        let mut ids: BTreeSet<&MessageId> = BTreeSet::new();
        for m in &self.messages {
            if m.id.is_empty() {
                return Err(TreeError::Validation(
                    "message id cannot be empty".to_string(),
                ));
            }
            if !ids.insert(&m.id) {
                return Err(TreeError::Validation(format!(
                    "duplicate message id {}",
                    m.id
                )));
            }
        }
        if self.messages.iter().filter(|m| m.latest).count() > 1 {
            return Err(TreeError::Validation(
                "more than one message marked latest".to_string(),
            ));
        }

        let mut incoming: BTreeSet<&MessageId> = BTreeSet::new();
        for t in &self.relations {
            if let ParentRef::Message(parent) = t.parent() {
                if !ids.contains(&parent) {
                    return Err(TreeError::Validation(format!(
                        "relation references unknown start {parent}"
                    )));
                }
            }
            if !ids.contains(&t.end_id) {
                return Err(TreeError::Validation(format!(
                    "relation references unknown end {}",
                    t.end_id
                )));
            }
            if !incoming.insert(&t.end_id) {
                return Err(TreeError::Validation(format!(
                    "message {} has more than one parent",
                    t.end_id
                )));
            }
        }
        for id in &ids {
            if !incoming.contains(id) {
                return Err(TreeError::Validation(format!(
                    "message {id} has no incoming edge"
                )));
            }
        }

        // Acyclicity: walking up from any message must reach the root.
        for m in &self.messages {
            let mut hops = 0usize;
            let mut cursor = m.id.clone();
            loop {
                match self.parent_of(&cursor) {
                    Some(ParentRef::Root) | None => break,
                    Some(ParentRef::Message(parent)) => {
                        hops += 1;
                        if hops > self.messages.len() {
                            return Err(TreeError::Validation(format!(
                                "cycle detected through message {}",
                                m.id
                            )));
                        }
                        cursor = parent;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_tree() -> ThreadTree {
        //      root
        //     /    \
        //   a        b
        //   |
        //   c
        ThreadTree::new(
            ThreadRoot::new("t1"),
            vec![Message::new("a"), Message::new("b"), Message::new("c")],
            vec![
                Triple::from_root("a"),
                Triple::from_root("b"),
                Triple::child(ParentRef::Message(MessageId::new("a")), "c"),
            ],
        )
    }

    #[test]
    fn metrics_on_small_tree() {
        let tree = small_tree();
        assert_eq!(tree.size(), 3);
        assert_eq!(tree.breadth(), 2);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.degree(&ParentRef::Root), 2);
        assert_eq!(tree.degree(&ParentRef::Message(MessageId::new("a"))), 1);
        assert_eq!(tree.degree(&ParentRef::Message(MessageId::new("c"))), 0);
    }

    #[test]
    fn validate_accepts_well_formed_tree() {
        assert!(small_tree().validate(&ThreadId::new("t1")).is_ok());
    }

    #[test]
    fn validate_rejects_thread_mismatch() {
        let err = small_tree().validate(&ThreadId::new("other")).unwrap_err();
        assert!(matches!(err, TreeError::Validation(_)));
    }

    #[test]
    fn validate_rejects_second_parent() {
        let mut tree = small_tree();
        tree.relations
            .push(Triple::child(ParentRef::Message(MessageId::new("b")), "c"));
        let err = tree.validate(&ThreadId::new("t1")).unwrap_err();
        assert!(err.to_string().contains("more than one parent"));
    }

    #[test]
    fn validate_rejects_orphan_message() {
        let mut tree = small_tree();
        tree.messages.push(Message::new("orphan"));
        let err = tree.validate(&ThreadId::new("t1")).unwrap_err();
        assert!(err.to_string().contains("no incoming edge"));
    }

    #[test]
    fn validate_rejects_unknown_relation_endpoint() {
        let mut tree = small_tree();
        tree.relations
            .push(Triple::child(ParentRef::Message(MessageId::new("a")), "ghost"));
        let err = tree.validate(&ThreadId::new("t1")).unwrap_err();
        assert!(err.to_string().contains("unknown end"));
    }

    #[test]
    fn validate_rejects_double_latest() {
        let mut tree = small_tree();
        tree.messages[0].latest = true;
        tree.messages[1].latest = true;
        let err = tree.validate(&ThreadId::new("t1")).unwrap_err();
        assert!(err.to_string().contains("latest"));
    }

    #[test]
    fn normalize_is_canonical() {
        let mut a = small_tree();
        let mut b = small_tree();
        b.messages.reverse();
        b.relations.reverse();
        a.normalize();
        b.normalize();
        assert_eq!(a, b);
    }
}
