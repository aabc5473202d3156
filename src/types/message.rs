//! Thread and message identity types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a thread.
///
/// Opaque string, globally unique across the store. Wraps the raw value and
/// implements `Ord` for deterministic ordering in maps and test output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Create a new ThreadId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identifier carries no value.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Unique identifier for a message within a thread.
///
/// Opaque string; uniqueness is scoped to the owning thread.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Create a new MessageId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identifier carries no value.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Synthetic anchor node of a thread. One per thread, created once,
/// destroyed only when the whole thread is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRoot {
    /// Thread identifier, globally unique.
    pub thread_id: ThreadId,
}

impl ThreadRoot {
    /// Create a root for the given thread.
    pub fn new(thread_id: impl Into<ThreadId>) -> Self {
        Self {
            thread_id: thread_id.into(),
        }
    }
}

/// A node in the tree, representing one conversational turn.
///
/// Identity never changes after creation; the `latest` flag is the only
/// mutable attribute and at most one message per thread may carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier, unique within its thread.
    pub id: MessageId,
    /// True when this message is the thread's current tip.
    #[serde(default)]
    pub latest: bool,
}

impl Message {
    /// Create a message with the `latest` flag cleared.
    pub fn new(id: impl Into<MessageId>) -> Self {
        Self {
            id: id.into(),
            latest: false,
        }
    }

    /// Create a message carrying the `latest` flag.
    pub fn latest(id: impl Into<MessageId>) -> Self {
        Self {
            id: id.into(),
            latest: true,
        }
    }
}
