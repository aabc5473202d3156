//! Property tests over randomly generated trees.
//!
//! Trees are generated as a parent-choice vector: node `i` attaches either
//! under the ThreadRoot or under some earlier node, so every generated shape
//! is a valid rooted tree by construction.

use std::sync::Arc;

use proptest::prelude::*;

use arbor_thread::{
    InMemoryTreeStore, Message, MessageId, ParentRef, ThreadId, ThreadRoot, ThreadTree,
    TreeEngine, Triple,
};

/// Parent of node `i`: `None` for the ThreadRoot, `Some(j)` with `j < i`.
#[derive(Debug, Clone)]
struct TreeShape {
    parents: Vec<Option<usize>>,
}

impl TreeShape {
    fn id(i: usize) -> MessageId {
        MessageId::new(format!("n{i:02}"))
    }

    fn len(&self) -> usize {
        self.parents.len()
    }

    /// Ancestor chain of `i` in root-to-leaf order, endpoints included.
    fn chain(&self, i: usize) -> Vec<MessageId> {
        let mut chain = vec![Self::id(i)];
        let mut cursor = i;
        while let Some(parent) = self.parents[cursor] {
            chain.push(Self::id(parent));
            cursor = parent;
        }
        chain.reverse();
        chain
    }

    /// The whole shape as a bulk-loadable tree aggregate.
    fn tree(&self, thread: &ThreadId) -> ThreadTree {
        let messages = (0..self.len()).map(|i| Message::new(Self::id(i))).collect();
        let relations = self
            .parents
            .iter()
            .enumerate()
            .map(|(i, parent)| match parent {
                None => Triple::from_root(Self::id(i)),
                Some(j) => Triple::child(ParentRef::Message(Self::id(*j)), Self::id(i)),
            })
            .collect();
        ThreadTree::new(ThreadRoot::new(thread.clone()), messages, relations)
    }

    /// Indices of `i` and all its descendants.
    fn subtree(&self, i: usize) -> Vec<usize> {
        let mut members = vec![i];
        // Parent indices are always smaller, so one forward pass suffices.
        for (node, parent) in self.parents.iter().enumerate().skip(i + 1) {
            if let Some(p) = parent {
                if members.contains(p) {
                    members.push(node);
                }
            }
        }
        members
    }
}

fn tree_shapes() -> impl Strategy<Value = TreeShape> {
    prop::collection::vec(any::<prop::sample::Index>(), 1..24).prop_map(|choices| {
        let parents = choices
            .iter()
            .enumerate()
            .map(|(i, choice)| {
                // 0..=i, where i itself means the ThreadRoot.
                let pick = choice.index(i + 1);
                (pick < i).then_some(pick)
            })
            .collect();
        TreeShape { parents }
    })
}

async fn build(shape: &TreeShape) -> (TreeEngine<InMemoryTreeStore>, ThreadId) {
    let engine = TreeEngine::new(Arc::new(InMemoryTreeStore::new()));
    let thread = ThreadId::new("prop");
    // `add_message` requires an existing ThreadRoot, so the first node goes
    // in as a one-node bulk load; the rest attach one at a time.
    let seed = ThreadTree::new(
        ThreadRoot::new(thread.clone()),
        vec![Message::new(TreeShape::id(0))],
        vec![Triple::from_root(TreeShape::id(0))],
    );
    engine.add_tree(&thread, &seed).await.unwrap();
    for (i, parent) in shape.parents.iter().enumerate().skip(1) {
        let parent_id = parent.map(TreeShape::id);
        engine
            .add_message(&thread, Message::new(TreeShape::id(i)), parent_id.as_ref())
            .await
            .unwrap();
    }
    (engine, thread)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every built tree satisfies the structural invariants: one parent per
    /// message, no cycles, size matches the generated shape.
    #[test]
    fn built_trees_are_structurally_valid(shape in tree_shapes()) {
        runtime().block_on(async {
            let (engine, thread) = build(&shape).await;
            let tree = engine.get(&thread).await.unwrap();
            tree.validate(&thread).unwrap();
            prop_assert_eq!(tree.size() as usize, shape.len());
            Ok(())
        })?;
    }

    /// Picking from the root to any node returns exactly its ancestor chain.
    #[test]
    fn pick_matches_ancestor_chain(shape in tree_shapes(), target in any::<prop::sample::Index>()) {
        runtime().block_on(async {
            let (engine, thread) = build(&shape).await;
            let target = target.index(shape.len());
            let path = engine
                .pick(&thread, None, Some(&TreeShape::id(target)))
                .await
                .unwrap();
            let got: Vec<MessageId> = path.messages.into_iter().map(|m| m.id).collect();
            prop_assert_eq!(got, shape.chain(target));
            Ok(())
        })?;
    }

    /// Deleting any node removes exactly its subtree and nothing else.
    #[test]
    fn delete_removes_exactly_the_subtree(shape in tree_shapes(), target in any::<prop::sample::Index>()) {
        runtime().block_on(async {
            let (engine, thread) = build(&shape).await;
            let target = target.index(shape.len());
            let expected = shape.subtree(target);

            let outcome = engine
                .delete(&thread, Some(&TreeShape::id(target)))
                .await
                .unwrap();
            prop_assert_eq!(outcome.removed as usize, expected.len());

            if expected.len() < shape.len() {
                let tree = engine.get(&thread).await.unwrap();
                prop_assert_eq!(tree.size() as usize, shape.len() - expected.len());
                for i in 0..shape.len() {
                    let present = tree.message(&TreeShape::id(i)).is_some();
                    prop_assert_eq!(present, !expected.contains(&i));
                }
            } else {
                // The whole forest went away with the only top-level branch.
                prop_assert!(engine.get(&thread).await.is_err());
            }
            Ok(())
        })?;
    }

    /// Bulk-loading the same tree twice yields exactly the state of loading
    /// it once.
    #[test]
    fn bulk_load_is_idempotent(shape in tree_shapes()) {
        runtime().block_on(async {
            let engine = TreeEngine::new(Arc::new(InMemoryTreeStore::new()));
            let thread = ThreadId::new("prop");
            let tree = shape.tree(&thread);

            engine.add_tree(&thread, &tree).await.unwrap();
            let before = engine.get(&thread).await.unwrap();
            engine.add_tree(&thread, &tree).await.unwrap();
            let after = engine.get(&thread).await.unwrap();

            prop_assert_eq!(&before, &after);
            prop_assert_eq!(after.size() as usize, shape.len());
            after.validate(&thread).unwrap();
            Ok(())
        })?;
    }

    /// No matter how many times latest is reassigned, at most one message
    /// carries the flag.
    #[test]
    fn latest_is_always_unique(shape in tree_shapes(), picks in prop::collection::vec(any::<prop::sample::Index>(), 1..8)) {
        runtime().block_on(async {
            let (engine, thread) = build(&shape).await;
            for pick in &picks {
                let target = pick.index(shape.len());
                engine
                    .set_latest_message(&thread, &TreeShape::id(target))
                    .await
                    .unwrap();
            }
            let tree = engine.get(&thread).await.unwrap();
            let flagged: Vec<&MessageId> = tree
                .messages
                .iter()
                .filter(|m| m.latest)
                .map(|m| &m.id)
                .collect();
            let last = picks.last().unwrap().index(shape.len());
            let expected = TreeShape::id(last);
            prop_assert_eq!(flagged, vec![&expected]);
            Ok(())
        })?;
    }
}
