//! Crate-wide error taxonomy.
//!
//! Every engine operation returns exactly one of these kinds; there is no
//! partial-success shape. Backends speak the same taxonomy so failures
//! surface to callers unmodified.

use crate::types::MessageId;

/// Error type for tree engine and store operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TreeError {
    /// Malformed input: empty tree, thread-id mismatch, duplicate ids,
    /// relations referencing unknown messages.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced ThreadRoot or Message does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// AddMessage target parent (or root) is missing.
    #[error("parent not found: {0}")]
    ParentNotFound(String),

    /// Pick endpoints are not in an ancestor/descendant relation.
    #[error("no path from {from} to {to}")]
    NoPath {
        /// Start of the requested path ("root" when picking from the ThreadRoot).
        from: String,
        /// End of the requested path.
        to: String,
    },

    /// Out-of-range or otherwise invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Backend unreachable or failed at the transport level.
    #[error("connection error: {0}")]
    Connection(String),

    /// Concurrent-mutation violation detected by the single-writer discipline.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl TreeError {
    /// NotFound for a missing thread.
    pub fn thread_not_found(thread: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("thread {thread} does not exist"))
    }

    /// NotFound for a missing message.
    pub fn message_not_found(id: &MessageId) -> Self {
        Self::NotFound(format!("message {id} does not exist"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = TreeError::NoPath {
            from: "msg_06".to_string(),
            to: "msg_03".to_string(),
        };
        assert_eq!(err.to_string(), "no path from msg_06 to msg_03");
    }
}
