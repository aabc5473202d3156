//! Relation types: the directed `CHILD` edges of a thread tree.

use serde::{Deserialize, Serialize};

use super::message::MessageId;

/// Kind of relation between two nodes.
///
/// `CHILD` is the only relation the contract defines. The enum exists so the
/// wire field stays stable if other kinds are ever added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum RelationKind {
    /// Parent owns child.
    #[default]
    #[serde(rename = "CHILD")]
    Child,
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Child => write!(f, "CHILD"),
        }
    }
}

/// Where an edge starts: the thread root, or a specific message.
///
/// On the wire this is the `start_id` field, with the empty string denoting
/// "from ThreadRoot".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParentRef {
    /// Edge starts at the ThreadRoot.
    Root,
    /// Edge starts at a message.
    Message(MessageId),
}

impl ParentRef {
    /// Build from an optional message id, `None` meaning the root.
    pub fn from_option(parent: Option<MessageId>) -> Self {
        match parent {
            Some(id) => Self::Message(id),
            None => Self::Root,
        }
    }

    /// The message id, or `None` for the root.
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            Self::Root => None,
            Self::Message(id) => Some(id),
        }
    }

    /// The wire representation of the start id.
    pub fn start_id(&self) -> &str {
        match self {
            Self::Root => "",
            Self::Message(id) => id.as_str(),
        }
    }
}

/// A directed edge `(start_id, relation, end_id)`.
///
/// Edges are created once and removed only by subtree deletion; they are
/// never updated in place. `start_id` empty means "from ThreadRoot".
/// Implements `Ord` for canonical ordering: (start_id, end_id, relation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    /// Source node id; empty when the edge starts at the ThreadRoot.
    #[serde(default)]
    pub start_id: String,
    /// Relation kind.
    #[serde(default)]
    pub relation: RelationKind,
    /// Target message id.
    pub end_id: MessageId,
}

impl Triple {
    /// Create a `CHILD` edge from `parent` to `end`.
    pub fn child(parent: ParentRef, end: impl Into<MessageId>) -> Self {
        Self {
            start_id: parent.start_id().to_string(),
            relation: RelationKind::Child,
            end_id: end.into(),
        }
    }

    /// Create a `CHILD` edge from the ThreadRoot to `end`.
    pub fn from_root(end: impl Into<MessageId>) -> Self {
        Self::child(ParentRef::Root, end)
    }

    /// Typed view of the edge source.
    pub fn parent(&self) -> ParentRef {
        if self.start_id.is_empty() {
            ParentRef::Root
        } else {
            ParentRef::Message(MessageId::new(self.start_id.clone()))
        }
    }

    /// True when the edge starts at the ThreadRoot.
    pub fn starts_at_root(&self) -> bool {
        self.start_id.is_empty()
    }
}

// Canonical ordering: start_id, then end_id, then relation.
impl PartialOrd for Triple {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Triple {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.start_id
            .cmp(&other.start_id)
            .then_with(|| self.end_id.cmp(&other.end_id))
            .then_with(|| self.relation.cmp(&other.relation))
    }
}
