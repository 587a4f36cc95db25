//! Bevy integration for topic trees.
//!
//! Provides:
//! - `TopicTreePlugin`: builder-pattern plugin that inserts a [`TopicTree`] resource
//! - `TopicLabels`: multi-topic component with O(1) membership checks
//! - `MergeLog` + `redirect_merged_labels`: keep labels pointing at live
//!   topics after a merge deletes the losing side
//!
//! # Example
//!
//! ```ignore
//! use bevy::prelude::*;
//! use acacia::bevy::*;
//! use acacia::TopicTree;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(
//!             TopicTreePlugin::new()
//!                 .with_seed(["science/physics", "science/biology"])
//!                 .track_merges(true),
//!         )
//!         .add_systems(Startup, spawn_entities)
//!         .run();
//! }
//!
//! fn spawn_entities(mut commands: Commands, tree: Res<TopicTree>) {
//!     let physics = tree.get_by_full_name("science/physics").unwrap().id();
//!     commands.spawn(TopicLabels::new().with(physics));
//! }
//! ```

use acacia_config::TreeConfig;
use bevy::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::codec::is_descendant_of;
use crate::notify::{MergePair, TreeEvent};
use crate::{TopicId, TopicTree};

// =============================================================================
// Plugin
// =============================================================================

/// Bevy plugin for the topic tree.
///
/// ```ignore
/// App::new()
///     .add_plugins(
///         TopicTreePlugin::from_config(TreeConfig::from_file("topics.toml")?)
///             .track_merges(true)
///     )
/// ```
#[derive(Default)]
pub struct TopicTreePlugin {
    config: TreeConfig,
    track_merges: bool,
}

impl TopicTreePlugin {
    /// A plugin with the default configuration and no seed topics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the tree (seed topics included) from `config`.
    pub fn from_config(config: TreeConfig) -> Self {
        Self {
            config,
            track_merges: false,
        }
    }

    /// Add seed full names on top of the configured ones.
    pub fn with_seed<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config = self.config.with_seed(paths);
        self
    }

    /// Redirect [`TopicLabels`] from merged topics to their survivors.
    ///
    /// Default: `false`
    pub fn track_merges(mut self, track: bool) -> Self {
        self.track_merges = track;
        self
    }
}

impl Plugin for TopicTreePlugin {
    fn build(&self, app: &mut App) {
        let mut tree = TopicTree::from_config(self.config.clone())
            .expect("Failed to build TopicTree from config");

        if self.track_merges {
            let log = MergeLog::default();
            let sink = log.clone();
            tree.subscribe(move |event| {
                if let TreeEvent::PreMerge(pairs) = event {
                    sink.push(pairs);
                }
            });
            app.insert_resource(log);
            app.add_systems(Update, redirect_merged_labels);
        }

        app.insert_resource(tree);
    }
}

impl Resource for TopicTree {}

// =============================================================================
// Merge tracking
// =============================================================================

/// Merge pairs announced by the tree and not yet applied to labels.
#[derive(Resource, Clone, Debug, Default)]
pub struct MergeLog {
    pending: Arc<Mutex<Vec<MergePair>>>,
}

impl MergeLog {
    fn push(&self, pairs: &[MergePair]) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.extend_from_slice(pairs);
        }
    }

    /// Drain the pending pairs, oldest first.
    pub fn take(&self) -> Vec<MergePair> {
        self.pending
            .lock()
            .map(|mut pending| std::mem::take(&mut *pending))
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().map(|p| p.is_empty()).unwrap_or(true)
    }
}

/// Rewrite every [`TopicLabels`] that references a merged-away topic.
pub fn redirect_merged_labels(log: Res<MergeLog>, mut labels: Query<&mut TopicLabels>) {
    let pairs = log.take();
    if pairs.is_empty() {
        return;
    }
    let mut touched = 0usize;
    for mut set in &mut labels {
        if pairs.iter().any(|pair| set.has(pair.losing)) {
            set.apply_merge(&pairs);
            touched += 1;
        }
    }
    debug!(pairs = pairs.len(), touched, "redirected merged topic labels");
}

// =============================================================================
// TopicLabels Component
// =============================================================================

/// A set of topics attached to an entity.
///
/// # Example
///
/// ```ignore
/// fn system(tree: Res<TopicTree>, query: Query<&TopicLabels>) {
///     let science = tree.get_by_full_name("science").unwrap().id();
///     for labels in query.iter() {
///         if labels.has_descendant_of(&tree, science) {
///             // Entity is labelled with something under "science"
///         }
///     }
/// }
/// ```
#[derive(Component, Clone, Debug, Default, PartialEq, Eq)]
pub struct TopicLabels {
    topics: HashSet<TopicId>,
}

impl TopicLabels {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with(mut self, id: TopicId) -> Self {
        self.topics.insert(id);
        self
    }

    /// Returns `true` if the topic was newly inserted.
    #[inline]
    pub fn insert(&mut self, id: TopicId) -> bool {
        self.topics.insert(id)
    }

    /// Returns `true` if the topic was present.
    #[inline]
    pub fn remove(&mut self, id: TopicId) -> bool {
        self.topics.remove(&id)
    }

    #[inline]
    pub fn has(&self, id: TopicId) -> bool {
        self.topics.contains(&id)
    }

    /// Is any label strictly below `ancestor` in `tree`?
    ///
    /// O(n) in the number of labels; each check is a path prefix test.
    pub fn has_descendant_of(&self, tree: &TopicTree, ancestor: TopicId) -> bool {
        self.descendants_of(tree, ancestor).next().is_some()
    }

    /// Labels strictly below `ancestor` in `tree`.
    pub fn descendants_of<'a>(
        &'a self,
        tree: &'a TopicTree,
        ancestor: TopicId,
    ) -> impl Iterator<Item = TopicId> + 'a {
        let prefix = tree.get(ancestor).ok().map(|t| t.path());
        self.topics.iter().copied().filter(move |&id| {
            let Some(prefix) = prefix else {
                return false;
            };
            tree.get(id).is_ok_and(|t| is_descendant_of(t.path(), prefix))
        })
    }

    /// Replace each losing topic with its survivor.
    pub fn apply_merge(&mut self, pairs: &[MergePair]) {
        for pair in pairs {
            if self.topics.remove(&pair.losing) {
                self.topics.insert(pair.surviving);
            }
        }
    }

    /// Drop labels whose topic no longer exists. Returns how many were dropped.
    pub fn retain_existing(&mut self, tree: &TopicTree) -> usize {
        let before = self.topics.len();
        self.topics.retain(|&id| tree.contains(id));
        before - self.topics.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = TopicId> + '_ {
        self.topics.iter().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.topics.clear();
    }
}

impl FromIterator<TopicId> for TopicLabels {
    fn from_iter<T: IntoIterator<Item = TopicId>>(iter: T) -> Self {
        Self {
            topics: iter.into_iter().collect(),
        }
    }
}

impl Extend<TopicId> for TopicLabels {
    fn extend<T: IntoIterator<Item = TopicId>>(&mut self, iter: T) {
        self.topics.extend(iter);
    }
}

// =============================================================================
// Tests
// =============================================================================
