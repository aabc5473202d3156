//! Canonical demo tree.
//!
//! A 28-message conversation used by the integration tests and as seed data
//! for a fresh deployment: six top-level branches under one root, twelve
//! leaves, and one deep branch
//! `msg_00 → msg_06 → msg_14 → msg_15 → msg_22 → msg_23 → {msg_24 → msg_25,
//! msg_26 → msg_27}` reaching depth 7. `msg_27` is the latest message.

use crate::types::{Message, MessageId, ParentRef, ThreadId, ThreadRoot, ThreadTree, Triple};

/// Thread id of the demo tree.
pub fn demo_thread_id() -> ThreadId {
    ThreadId::new("thread_demo")
}

/// Build the canonical 28-message demo tree.
pub fn demo_tree() -> ThreadTree {
    // (parent, child); None parent means a top-level branch.
    let edges: [(Option<&str>, &str); 28] = [
        (None, "msg_00"),
        (None, "msg_01"),
        (None, "msg_02"),
        (None, "msg_03"),
        (None, "msg_04"),
        (None, "msg_05"),
        (Some("msg_00"), "msg_06"),
        (Some("msg_00"), "msg_07"),
        (Some("msg_01"), "msg_08"),
        (Some("msg_01"), "msg_09"),
        (Some("msg_02"), "msg_10"),
        (Some("msg_03"), "msg_11"),
        (Some("msg_03"), "msg_12"),
        (Some("msg_04"), "msg_13"),
        (Some("msg_06"), "msg_14"),
        (Some("msg_14"), "msg_15"),
        (Some("msg_08"), "msg_16"),
        (Some("msg_10"), "msg_17"),
        (Some("msg_10"), "msg_18"),
        (Some("msg_11"), "msg_19"),
        (Some("msg_13"), "msg_20"),
        (Some("msg_13"), "msg_21"),
        (Some("msg_15"), "msg_22"),
        (Some("msg_22"), "msg_23"),
        (Some("msg_23"), "msg_24"),
        (Some("msg_24"), "msg_25"),
        (Some("msg_23"), "msg_26"),
        (Some("msg_26"), "msg_27"),
    ];

    let messages = edges
        .iter()
        .map(|(_, child)| {
            if *child == "msg_27" {
                Message::latest(*child)
            } else {
                Message::new(*child)
            }
        })
        .collect();
    let relations = edges
        .iter()
        .map(|(parent, child)| match parent {
            None => Triple::from_root(*child),
            Some(p) => Triple::child(ParentRef::Message(MessageId::new(*p)), *child),
        })
        .collect();

    ThreadTree::new(ThreadRoot::new(demo_thread_id()), messages, relations)
}
