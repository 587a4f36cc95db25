//! Pre-relocation notifications.
//!
//! Subsystems that hold references to topics (labels on entities, cached
//! subscriptions and the like) register a listener and are told *before* the tree
//! rewrites anything:
//!
//! ```text
//! merge_to(x, target)
//!   validate ──► PreMerge([(losing, surviving), …])
//!            ──► PreMove([(node, new_parent), …])   (only if any child moves)
//!            ──► rewrite rows ──► commit
//! ```
//!
//! Events are emitted once validation has passed. A capacity failure found
//! while rewriting can still abort the operation after listeners were told,
//! in which case the tree is left unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::TopicId;

/// A node about to be re-parented (`None` = becomes a root).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovePair {
    pub node: TopicId,
    pub new_parent: Option<TopicId>,
}

/// A node about to be folded into a same-named survivor and deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergePair {
    pub losing: TopicId,
    pub surviving: TopicId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeEvent {
    PreMove(Vec<MovePair>),
    PreMerge(Vec<MergePair>),
}

/// Handle returned by [`TopicTree::subscribe`](crate::TopicTree::subscribe).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Callback = Box<dyn Fn(&TreeEvent) + Send + Sync>;

/// Registered listeners, called synchronously in subscription order.
#[derive(Default)]
pub(crate) struct Listeners {
    next: u64,
    entries: Vec<(ListenerId, Callback)>,
}

impl Listeners {
    pub(crate) fn subscribe(&mut self, callback: Callback) -> ListenerId {
        self.next += 1;
        let id = ListenerId(self.next);
        self.entries.push((id, callback));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn emit(&self, event: &TreeEvent) {
        trace!(listeners = self.entries.len(), ?event, "emitting tree event");
        for (_, callback) in &self.entries {
            callback(event);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

impl crate::TopicTree {
    /// Register a callback for [`TreeEvent`]s.
    pub fn subscribe(&mut self, callback: impl Fn(&TreeEvent) + Send + Sync + 'static) -> ListenerId {
        self.listeners.subscribe(Box::new(callback))
    }

    /// Returns `false` if `id` was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }
}
