//! The topic tree and its placement engine.
//!
//! [`TopicTree`] owns the configuration, the path codec, the row store and
//! the listener registry. Every mutation opens an [`Edit`] (a journaled
//! transaction plus the codec and ordering policy), stages all row changes
//! through it, and commits only when every step succeeded.
//!
//! ## Concurrency
//!
//! Path allocation ("the next ordinal under this parent") is a
//! read-then-write sequence. Mutations take `&mut self`, so a tree shared
//! across threads must be wrapped in a lock (or owned by a scheduler that
//! serializes writers, such as the ECS resource in [`crate::bevy`]). Readers
//! holding `&TopicTree` never observe a half-applied mutation.

use acacia_config::{SiblingOrder, TreeConfig};
use tracing::{debug, trace};
use zerocopy::{Immutable, IntoBytes};

use crate::codec::PathCodec;
use crate::error::{Result, TreeError};
use crate::notify::Listeners;
use crate::store::{TopicStore, Transaction};
use crate::topic::Topic;
use crate::TopicId;

/// Where a new node goes relative to an existing sibling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SiblingPos {
    /// Before every current sibling.
    First,
    /// Immediately before the anchor.
    Left,
    /// Immediately after the anchor.
    Right,
    /// After every current sibling.
    Last,
    /// In ascending name order.
    Sorted,
}

/// Internal ordinal allocation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    /// After the last sibling.
    Last,
    /// Before the first sibling whose name sorts after the new name.
    Sorted,
    /// Immediately before the sibling at this ordinal.
    Before(u64),
    /// Keep the node's current path (relocation only).
    Keep,
}

/// A hierarchical namespace of named topics addressed by full name.
///
/// ```
/// use acacia::TopicTree;
///
/// let mut tree = TopicTree::new();
/// let (leaf, created) = tree.get_or_create_by_full_name("a/b/c").unwrap();
/// assert!(created);
/// assert_eq!(leaf.full_name(), "a/b/c");
/// assert_eq!(tree.get_by_full_name("a//b/c/").unwrap().id(), leaf.id());
/// ```
#[derive(Debug)]
pub struct TopicTree {
    pub(crate) config: TreeConfig,
    pub(crate) codec: PathCodec,
    pub(crate) store: TopicStore,
    pub(crate) listeners: Listeners,
}

impl Default for TopicTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicTree {
    /// An empty tree with the default configuration.
    pub fn new() -> Self {
        Self {
            codec: PathCodec::default(),
            config: TreeConfig::default(),
            store: TopicStore::new(),
            listeners: Listeners::default(),
        }
    }

    /// An empty tree with `config`; seed paths are ignored.
    pub fn with_config(config: TreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            codec: PathCodec::from_config(&config)?,
            config,
            store: TopicStore::new(),
            listeners: Listeners::default(),
        })
    }

    /// Build a tree from `config` and create every seed topic.
    pub fn from_config(config: TreeConfig) -> Result<Self> {
        let seed = config.seed_entries();
        let mut tree = Self::with_config(config)?;
        for entry in &seed {
            tree.get_or_create_by_full_name(&entry.full_name)?;
        }
        debug!(topics = tree.len(), "built topic tree from config");
        Ok(tree)
    }

    #[inline]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    #[inline]
    pub fn codec(&self) -> &PathCodec {
        &self.codec
    }

    #[inline]
    pub fn separator(&self) -> &str {
        &self.config.separator
    }

    /// Total number of topics.
    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn get(&self, id: TopicId) -> Result<&Topic> {
        self.store.get(id).ok_or_else(|| TreeError::not_found_id(id))
    }

    pub fn contains(&self, id: TopicId) -> bool {
        self.store.get(id).is_some()
    }

    /// All topics in pre-order (path order).
    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.store.iter()
    }

    /// Root topics in sibling order. Empty for an empty tree.
    pub fn roots(&self) -> Vec<&Topic> {
        self.store.children("", self.codec.step_len())
    }

    /// Direct children of `id` in sibling order.
    pub fn children(&self, id: TopicId) -> Result<Vec<&Topic>> {
        let node = self.get(id)?;
        Ok(self
            .store
            .children(&node.path, node.path.len() + self.codec.step_len()))
    }

    pub fn parent(&self, id: TopicId) -> Result<Option<&Topic>> {
        let node = self.get(id)?;
        Ok(self
            .codec
            .parent_path(&node.path)
            .and_then(|p| self.store.get_by_path(p)))
    }

    /// Ancestors from the root down to (excluding) `id`.
    pub fn ancestors(&self, id: TopicId) -> Result<Vec<&Topic>> {
        let node = self.get(id)?;
        Ok((1..node.depth)
            .filter_map(|d| self.store.get_by_path(self.codec.base_path(&node.path, d)))
            .collect())
    }

    /// Every topic strictly below `id`, in pre-order.
    pub fn descendants(&self, id: TopicId) -> Result<Vec<&Topic>> {
        let node = self.get(id)?;
        Ok(self.store.subtree(&node.path).skip(1).collect())
    }

    /// Depth of the deepest topic (0 for an empty tree).
    pub fn max_depth(&self) -> usize {
        self.store.iter().map(Topic::depth).max().unwrap_or(0)
    }

    // =========================================================================
    // Placement
    // =========================================================================

    /// Add a root topic, placed per the configured ordering.
    pub fn add_root(&mut self, name: impl Into<String>) -> Result<Topic> {
        let name = name.into();
        let (mut edit, _) = self.edit();
        let slot = edit.default_slot();
        let topic = edit.place(None, &name, slot)?;
        edit.commit();
        Ok(topic)
    }

    /// Add a child under `parent`, placed per the configured ordering.
    pub fn add_child(&mut self, parent: TopicId, name: impl Into<String>) -> Result<Topic> {
        let name = name.into();
        let (mut edit, _) = self.edit();
        let slot = edit.default_slot();
        let topic = edit.place(Some(parent), &name, slot)?;
        edit.commit();
        Ok(topic)
    }

    /// Add a topic next to `anchor`, sharing its parent.
    ///
    /// Under [`SiblingOrder::Sorted`] only [`SiblingPos::Sorted`] is accepted;
    /// any other position fails with [`TreeError::InvalidPosition`].
    pub fn add_sibling(
        &mut self,
        anchor: TopicId,
        name: impl Into<String>,
        pos: SiblingPos,
    ) -> Result<Topic> {
        if self.config.ordering == SiblingOrder::Sorted && pos != SiblingPos::Sorted {
            return Err(TreeError::InvalidPosition { pos });
        }
        let name = name.into();
        let (mut edit, _) = self.edit();
        let anchor = edit.topic(anchor)?;
        let parent = edit.parent_of(&anchor);
        let anchor_pos = edit.codec.last_pos(&anchor.path);
        let positions = edit.sibling_positions(parent.as_ref());
        let slot = match pos {
            SiblingPos::First => positions.first().map_or(Slot::Last, |&p| Slot::Before(p)),
            SiblingPos::Left => Slot::Before(anchor_pos),
            SiblingPos::Right => positions
                .iter()
                .find(|&&p| p > anchor_pos)
                .map_or(Slot::Last, |&p| Slot::Before(p)),
            SiblingPos::Last => Slot::Last,
            SiblingPos::Sorted => Slot::Sorted,
        };
        let topic = edit.place(parent.map(|p| p.id), &name, slot)?;
        edit.commit();
        Ok(topic)
    }

    /// Remove `id` and its whole subtree. Returns the removed topics.
    pub fn delete(&mut self, id: TopicId) -> Result<Vec<Topic>> {
        let (mut edit, _) = self.edit();
        let removed = edit.remove_subtree(id)?;
        edit.commit();
        Ok(removed)
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Set a typed attribute. Returns the previous raw bytes if any.
    pub fn set_meta<T: IntoBytes + Immutable>(
        &mut self,
        id: TopicId,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Option<Vec<u8>>> {
        self.set_meta_raw(id, key, value.as_bytes().to_vec())
    }

    /// Set a raw attribute. Returns the previous bytes if any.
    pub fn set_meta_raw(
        &mut self,
        id: TopicId,
        key: impl Into<String>,
        value: Vec<u8>,
    ) -> Result<Option<Vec<u8>>> {
        let key = key.into();
        let mut previous = None;
        let mut tx = self.store.begin();
        tx.update(id, |t| previous = t.meta.insert(key, value))?;
        tx.commit();
        Ok(previous)
    }

    pub fn remove_meta(&mut self, id: TopicId, key: &str) -> Result<Option<Vec<u8>>> {
        let mut removed = None;
        let mut tx = self.store.begin();
        tx.update(id, |t| removed = t.meta.remove(key))?;
        tx.commit();
        Ok(removed)
    }

    // =========================================================================
    // Consistency
    // =========================================================================

    /// Scan every row and report each structural invariant violation.
    ///
    /// Sibling name order is only checked under sorted ordering.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let step = self.codec.step_len();
        let mut prev: Option<&Topic> = None;
        let mut full_names = std::collections::HashSet::new();

        for topic in self.store.iter() {
            if topic.path.is_empty() || topic.path.len() % step != 0 {
                problems.push(format!("{topic}: malformed path '{}'", topic.path));
            }
            if topic.depth != self.codec.depth_of(&topic.path) {
                problems.push(format!("{topic}: depth {} disagrees with path", topic.depth));
            }
            if let Some(parent_path) = self.codec.parent_path(&topic.path) {
                match self.store.get_by_path(parent_path) {
                    None => problems.push(format!("{topic}: parent path missing")),
                    Some(parent) if parent.depth + 1 != topic.depth => {
                        problems.push(format!("{topic}: depth not parent depth + 1"));
                    }
                    Some(_) => {}
                }
                // Pre-order: the previous row is the parent or inside its subtree.
                if !prev.is_some_and(|p| p.path.starts_with(parent_path)) {
                    problems.push(format!("{topic}: not in pre-order after its parent"));
                }
            }
            if !full_names.insert(topic.full_name.as_str()) {
                problems.push(format!("{topic}: duplicate full name"));
            }
            match self.derive_full_name(topic.id) {
                Ok(derived) if derived == topic.full_name => {}
                Ok(derived) => problems.push(format!("{topic}: cached full name, derived '{derived}'")),
                Err(e) => problems.push(format!("{topic}: {e}")),
            }
            let children = self.store.children(&topic.path, topic.path.len() + step);
            if children.len() != topic.num_children {
                problems.push(format!(
                    "{topic}: num_children {} but {} children",
                    topic.num_children,
                    children.len()
                ));
            }
            prev = Some(topic);
        }

        if self.config.ordering == SiblingOrder::Sorted {
            let mut groups = vec![self.roots()];
            groups.extend(
                self.store
                    .iter()
                    .map(|t| self.store.children(&t.path, t.path.len() + step)),
            );
            for siblings in groups {
                if siblings.windows(2).any(|w| w[0].name > w[1].name) {
                    problems.push(format!(
                        "siblings out of name order: {:?}",
                        siblings.iter().map(|t| t.name()).collect::<Vec<_>>()
                    ));
                }
            }
        }
        problems
    }

    /// Split borrows: a staged edit plus the listener registry.
    pub(crate) fn edit(&mut self) -> (Edit<'_>, &Listeners) {
        let Self {
            config,
            codec,
            store,
            listeners,
        } = self;
        let edit = Edit {
            codec: &*codec,
            separator: config.separator.as_str(),
            ordering: config.ordering,
            tx: store.begin(),
        };
        (edit, &*listeners)
    }
}

/// A node name must be non-empty and must not contain the separator.
pub(crate) fn validate_name(name: &str, separator: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TreeError::InvalidName {
            name: name.into(),
            reason: "name is empty".into(),
        });
    }
    if name.contains(separator) {
        return Err(TreeError::InvalidName {
            name: name.into(),
            reason: format!("name contains the separator '{separator}'"),
        });
    }
    Ok(())
}

// =============================================================================
// Edit: one all-or-nothing structural mutation
// =============================================================================

pub(crate) struct Edit<'a> {
    pub(crate) codec: &'a PathCodec,
    pub(crate) separator: &'a str,
    pub(crate) ordering: SiblingOrder,
    pub(crate) tx: Transaction<'a>,
}

impl Edit<'_> {
    pub(crate) fn commit(self) {
        self.tx.commit();
    }

    pub(crate) fn topic(&self, id: TopicId) -> Result<Topic> {
        self.tx.get(id).cloned().ok_or_else(|| TreeError::not_found_id(id))
    }

    pub(crate) fn parent_of(&self, topic: &Topic) -> Option<Topic> {
        self.codec
            .parent_path(&topic.path)
            .and_then(|p| self.tx.get_by_path(p))
            .cloned()
    }

    pub(crate) fn parent_id(&self, topic: &Topic) -> Option<TopicId> {
        self.codec
            .parent_path(&topic.path)
            .and_then(|p| self.tx.get_by_path(p))
            .map(Topic::id)
    }

    pub(crate) fn default_slot(&self) -> Slot {
        match self.ordering {
            SiblingOrder::Sorted => Slot::Sorted,
            SiblingOrder::Insertion => Slot::Last,
        }
    }

    /// `parent`'s full name, the separator, then `name`.
    pub(crate) fn join(&self, parent: Option<&Topic>, name: &str) -> String {
        match parent {
            Some(p) => format!("{}{}{}", p.full_name, self.separator, name),
            None => name.to_string(),
        }
    }

    pub(crate) fn check_name(&self, name: &str) -> Result<()> {
        validate_name(name, self.separator)
    }

    /// The child of `parent` named `name`, other than `except`.
    pub(crate) fn colliding(
        &self,
        parent: Option<&Topic>,
        name: &str,
        except: TopicId,
    ) -> Option<Topic> {
        self.tx
            .get_by_full_name(&self.join(parent, name))
            .filter(|t| t.id != except)
            .cloned()
    }

    pub(crate) fn children_of(&self, parent: Option<&Topic>) -> Vec<Topic> {
        let (prefix, depth) = match parent {
            Some(p) => (p.path.as_str(), p.depth + 1),
            None => ("", 1),
        };
        self.tx
            .children(prefix, depth * self.codec.step_len())
            .into_iter()
            .cloned()
            .collect()
    }

    pub(crate) fn sibling_positions(&self, parent: Option<&Topic>) -> Vec<u64> {
        self.children_of(parent)
            .iter()
            .map(|t| self.codec.last_pos(&t.path))
            .collect()
    }

    /// Create and persist a new topic under `parent`.
    pub(crate) fn place(&mut self, parent: Option<TopicId>, name: &str, slot: Slot) -> Result<Topic> {
        self.check_name(name)?;
        let parent = parent.map(|id| self.topic(id)).transpose()?;
        let full_name = self.join(parent.as_ref(), name);
        if self.tx.get_by_full_name(&full_name).is_some() {
            return Err(TreeError::DuplicateName { full_name });
        }

        let path = self.allocate(parent.as_ref(), name, slot, None)?;
        let depth = self.codec.depth_of(&path);
        let id = self.tx.next_id();
        let topic = Topic::new(id, name.to_string(), path, depth, full_name);
        self.tx.insert(topic.clone())?;
        if let Some(parent) = &parent {
            self.tx.update(parent.id, |p| p.num_children += 1)?;
        }
        debug!(id, path = %topic.path, full_name = %topic.full_name, "placed topic");
        Ok(topic)
    }

    /// Pick a free path for a child of `parent`, shifting siblings if needed.
    ///
    /// `exclude` is a node being relocated among these siblings: it does not
    /// count when choosing the slot, but it is shifted along with the others,
    /// so callers must re-read it afterwards.
    pub(crate) fn allocate(
        &mut self,
        parent: Option<&Topic>,
        name: &str,
        slot: Slot,
        exclude: Option<TopicId>,
    ) -> Result<String> {
        let parent_path = parent.map(|p| p.path.as_str());
        let siblings = self.children_of(parent);
        let others: Vec<&Topic> = siblings.iter().filter(|t| Some(t.id) != exclude).collect();

        let slot = match slot {
            Slot::Sorted => others
                .iter()
                .find(|t| t.name.as_str() > name)
                .map_or(Slot::Last, |t| Slot::Before(self.codec.last_pos(&t.path))),
            other => other,
        };

        match slot {
            Slot::Before(pos) => {
                let prev = others
                    .iter()
                    .map(|t| self.codec.last_pos(&t.path))
                    .filter(|&p| p < pos)
                    .max()
                    .unwrap_or(0);
                if pos > prev + 1 {
                    // A gap is left by an earlier move or delete.
                    return self.codec.child_path(parent_path, pos - 1);
                }
                self.shift_siblings(&siblings, pos)?;
                self.codec.child_path(parent_path, pos)
            }
            _ => match others.last() {
                Some(last) => self.codec.inc_path(&last.path),
                None => self.codec.child_path(parent_path, 1),
            },
        }
    }

    /// Move the run of siblings occupying `from`, `from + 1`, ... (each with
    /// its subtree) one ordinal to the right. The run ends at the first free
    /// ordinal, which the last shifted sibling takes.
    fn shift_siblings(&mut self, siblings: &[Topic], from: u64) -> Result<()> {
        let mut rows = Vec::new();
        let mut shifted = 0usize;
        let mut next = from;
        // Siblings come in path order, so ordinals ascend.
        for sibling in siblings {
            let pos = self.codec.last_pos(&sibling.path);
            if pos < next {
                continue;
            }
            if pos > next {
                break;
            }
            next += 1;
            let new_prefix = self.codec.with_last_pos(&sibling.path, pos + 1)?;
            for row in self.tx.subtree(&sibling.path) {
                let mut row = row.clone();
                row.path = self.codec.rebase(&row.path, &sibling.path, &new_prefix)?;
                rows.push(row);
            }
            shifted += 1;
        }
        trace!(shifted, rows = rows.len(), from, "shifting siblings");
        self.tx.rewrite(rows)
    }

    /// Remove `id` with its subtree and update its parent's child count.
    pub(crate) fn remove_subtree(&mut self, id: TopicId) -> Result<Vec<Topic>> {
        let node = self.topic(id)?;
        let parent = self.parent_id(&node);
        let ids: Vec<TopicId> = self.tx.subtree(&node.path).map(Topic::id).collect();
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            removed.push(self.tx.remove(id)?);
        }
        if let Some(parent) = parent {
            self.tx.update(parent, |p| p.num_children -= 1)?;
        }
        debug!(id, full_name = %node.full_name, removed = removed.len(), "deleted subtree");
        Ok(removed)
    }
}
