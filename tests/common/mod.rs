//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use acacia::{TopicId, TopicTree, TreeEvent};
use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("acacia=info".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

/// Names chosen so that "c" is the leaf of several different paths, "b"
/// appears twice and "d" only once.
pub const FOREST: [&str; 4] = ["a/b/c", "a/x/c", "c/b/d", "x/y/c"];

/// The forest built one node at a time, without going through
/// `get_or_create_by_full_name`.
pub fn forest() -> TopicTree {
    let mut tree = TopicTree::new();
    for full_name in FOREST {
        let mut parent: Option<TopicId> = None;
        for name in full_name.split('/') {
            let existing = match parent {
                Some(p) => tree
                    .children(p)
                    .unwrap()
                    .into_iter()
                    .find(|t| t.name() == name)
                    .map(|t| t.id()),
                None => tree.roots().into_iter().find(|t| t.name() == name).map(|t| t.id()),
            };
            let id = match existing {
                Some(id) => id,
                None => match parent {
                    Some(p) => tree.add_child(p, name).unwrap().id(),
                    None => tree.add_root(name).unwrap().id(),
                },
            };
            parent = Some(id);
        }
    }
    tree
}

pub fn id(tree: &TopicTree, full_name: &str) -> TopicId {
    tree.get_by_full_name(full_name)
        .unwrap_or_else(|e| panic!("{full_name}: {e}"))
        .id()
}

pub fn full_names(tree: &TopicTree) -> Vec<String> {
    tree.iter().map(|t| t.full_name().to_string()).collect()
}

pub fn assert_consistent(tree: &TopicTree) {
    let problems = tree.check_invariants();
    assert!(problems.is_empty(), "invariant violations: {problems:#?}");
}

/// Record every event the tree emits.
pub fn record_events(tree: &mut TopicTree) -> Arc<Mutex<Vec<TreeEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    tree.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    events
}
