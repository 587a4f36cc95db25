//! Property-based invariant tests for structural edits.
//!
//! Verifies, for random sequences of edits on small trees:
//! 1. Path order is pre-order, and depth and child counts agree with paths
//! 2. Cached full names equal names derived from ancestors, and are unique
//! 3. Under sorted ordering, siblings stay in name order and explicit
//!    sibling positions are refused
//! 4. A failed edit leaves every row exactly as it was
//! 5. Merges never lose a non-losing node

mod common;

use acacia::{SiblingOrder, SiblingPos, Topic, TopicTree, TreeConfig};
use common::assert_consistent;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Create(Vec<String>),
    Move(usize, Option<usize>),
    Merge(usize, Option<usize>),
    Rename(usize, String),
    Delete(usize),
    Sibling(usize, String, SiblingPos),
}

// ── Strategy helpers ──────────────────────────────────────────────────

fn arb_name() -> impl Strategy<Value = String> {
    // A tiny alphabet so collisions (and therefore merges) are common.
    prop_oneof![Just("a"), Just("b"), Just("c"), Just("d")].prop_map(String::from)
}

fn arb_pos() -> impl Strategy<Value = SiblingPos> {
    prop_oneof![
        Just(SiblingPos::First),
        Just(SiblingPos::Left),
        Just(SiblingPos::Right),
        Just(SiblingPos::Last),
        Just(SiblingPos::Sorted),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => prop::collection::vec(arb_name(), 1..4).prop_map(Op::Create),
        1 => (any::<usize>(), prop::option::of(any::<usize>())).prop_map(|(a, b)| Op::Move(a, b)),
        2 => (any::<usize>(), prop::option::of(any::<usize>())).prop_map(|(a, b)| Op::Merge(a, b)),
        1 => (any::<usize>(), arb_name()).prop_map(|(a, n)| Op::Rename(a, n)),
        1 => any::<usize>().prop_map(Op::Delete),
        1 => (any::<usize>(), arb_name(), arb_pos()).prop_map(|(a, n, p)| Op::Sibling(a, n, p)),
    ]
}

fn pick(tree: &TopicTree, index: usize) -> Option<u64> {
    let len = tree.len();
    (len > 0).then(|| tree.iter().nth(index % len).map(Topic::id)).flatten()
}

fn snapshot(tree: &TopicTree) -> Vec<Topic> {
    tree.iter().cloned().collect()
}

/// Apply one op. Returns whether it succeeded; failures must not change rows.
fn apply(tree: &mut TopicTree, op: &Op) -> bool {
    let before = snapshot(tree);
    let result = match op {
        Op::Create(names) => tree.get_or_create_by_full_name(&names.join("/")).map(drop),
        Op::Move(a, b) => match pick(tree, *a) {
            Some(node) => {
                let target = (*b).and_then(|b| pick(tree, b));
                tree.move_to(node, target).map(drop)
            }
            None => return false,
        },
        Op::Merge(a, b) => match pick(tree, *a) {
            Some(node) => {
                let target = (*b).and_then(|b| pick(tree, b));
                let subtree: Vec<u64> = tree.get_subtree(tree.get(node).unwrap().full_name())
                    .unwrap()
                    .iter()
                    .map(|t| t.id())
                    .collect();
                let survivors: Vec<u64> = before
                    .iter()
                    .map(Topic::id)
                    .filter(|id| !subtree.contains(id))
                    .collect();
                let outcome = tree.merge_to(node, target);
                if outcome.is_ok() {
                    for id in survivors {
                        assert!(tree.contains(id), "merge dropped unrelated topic {id}");
                    }
                }
                outcome.map(drop)
            }
            None => return false,
        },
        Op::Rename(a, name) => match pick(tree, *a) {
            Some(node) => tree.rename(node, name).map(drop),
            None => return false,
        },
        Op::Delete(a) => match pick(tree, *a) {
            Some(node) => tree.delete(node).map(drop),
            None => return false,
        },
        Op::Sibling(a, name, pos) => match pick(tree, *a) {
            Some(anchor) => tree.add_sibling(anchor, name.clone(), *pos).map(drop),
            None => return false,
        },
    };
    if result.is_err() {
        assert_eq!(snapshot(tree), before, "failed {op:?} changed the tree");
    }
    result.is_ok()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn sorted_tree_stays_consistent(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut tree = TopicTree::new();
        for op in &ops {
            let ok = apply(&mut tree, op);
            if let Op::Sibling(_, _, pos) = op {
                prop_assert!(!ok || *pos == SiblingPos::Sorted, "explicit {pos:?} accepted");
            }
            assert_consistent(&tree);
        }
    }

    #[test]
    fn insertion_tree_stays_consistent(ops in prop::collection::vec(arb_op(), 1..40)) {
        let config = TreeConfig::default().with_ordering(SiblingOrder::Insertion);
        let mut tree = TopicTree::with_config(config).unwrap();
        for op in &ops {
            apply(&mut tree, op);
            assert_consistent(&tree);
        }
    }

    #[test]
    fn narrow_steps_overflow_cleanly(ops in prop::collection::vec(arb_op(), 1..60)) {
        // One base-36 digit per step and three levels at most.
        let config = TreeConfig::default().with_step_len(1).with_max_path_len(3);
        let mut tree = TopicTree::with_config(config).unwrap();
        for op in &ops {
            apply(&mut tree, op);
            assert_consistent(&tree);
        }
        prop_assert!(tree.max_depth() <= 3);
    }

    #[test]
    fn lookup_ignores_separator_noise(names in prop::collection::vec(arb_name(), 1..5), noise in 1usize..4) {
        let mut tree = TopicTree::new();
        let (leaf, _) = tree.get_or_create_by_full_name(&names.join("/")).unwrap();
        let sep = "/".repeat(noise);
        let noisy = format!("{sep}{}{sep}", names.join(&sep));
        prop_assert_eq!(tree.get_by_full_name(&noisy).unwrap().id(), leaf.id());
    }
}
