//! Move, merge and rename.
//!
//! All three re-parent or re-label a node, which means rewriting the path,
//! depth and full name of its whole subtree in one transaction.
//!
//! Merging folds a node into a same-named node at the destination:
//!
//! ```text
//! before                     after merge_to(x/y, None)
//!
//! x ─ y ─ c ─ f              x
//! y ─ c ─ e                  y ─ c ─ e
//!   └ d                        │   └ f
//!                              └ d
//! ```
//!
//! `x/y` collides with the root `y` and `x/y/c` with `y/c`, so both pairs
//! merge. `x/y/c/f` has no counterpart and moves under `y/c`.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TreeError};
use crate::notify::{MergePair, MovePair, TreeEvent};
use crate::topic::Topic;
use crate::tree::{Edit, Slot};
use crate::{TopicId, TopicTree};

/// What a move or merge actually did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocation {
    /// The node that now carries the relocated name.
    pub survivor: TopicId,
    /// Nodes that were folded into a survivor and deleted.
    pub merged: Vec<MergePair>,
    /// Nodes whose parent changed.
    pub moved: Vec<MovePair>,
}

impl Relocation {
    fn unchanged(id: TopicId) -> Self {
        Self {
            survivor: id,
            ..Self::default()
        }
    }

    /// True when the operation found nothing to do.
    pub fn is_noop(&self) -> bool {
        self.merged.is_empty() && self.moved.is_empty()
    }
}

/// Merge and move lists computed before anything is written.
struct MergePlan {
    merged: Vec<MergePair>,
    moved: Vec<MovePair>,
}

impl Edit<'_> {
    /// Fail if `target` is `node` or one of its descendants.
    pub(crate) fn check_cycle(&self, node: &Topic, target: Option<&Topic>) -> Result<()> {
        let Some(target) = target else {
            return Ok(());
        };
        if self.within(target, node) {
            return Err(TreeError::CycleRejected {
                node: node.id,
                target: target.id,
            });
        }
        Ok(())
    }

    /// Is `topic` the same node as `root` or below it?
    pub(crate) fn within(&self, topic: &Topic, root: &Topic) -> bool {
        topic.id == root.id
            || topic
                .full_name
                .strip_prefix(root.full_name.as_str())
                .is_some_and(|rest| rest.starts_with(self.separator))
    }

    /// Re-parent (and optionally rename) `id` with its whole subtree.
    ///
    /// Does not check for collisions; callers do that first.
    pub(crate) fn relocate(
        &mut self,
        id: TopicId,
        new_parent: Option<TopicId>,
        new_name: Option<&str>,
        slot: Slot,
    ) -> Result<Topic> {
        let node = self.topic(id)?;
        let name = new_name.unwrap_or(&node.name).to_string();
        let target = new_parent.map(|p| self.topic(p)).transpose()?;
        let old_parent = self.parent_id(&node);

        let new_path = match slot {
            Slot::Keep => node.path.clone(),
            slot => self.allocate(target.as_ref(), &name, slot, Some(id))?,
        };
        // Allocation may have shifted the node along with its siblings.
        let node = self.topic(id)?;
        let new_full_name = self.join(target.as_ref(), &name);

        let mut rows = Vec::new();
        for row in self.tx.subtree(&node.path) {
            let mut row = row.clone();
            row.path = self.codec.rebase(&row.path, &node.path, &new_path)?;
            row.depth = self.codec.depth_of(&row.path);
            row.full_name = format!("{}{}", new_full_name, &row.full_name[node.full_name.len()..]);
            if row.id == id {
                row.name = name.clone();
            }
            rows.push(row);
        }
        let count = rows.len();
        self.tx.rewrite(rows)?;

        if old_parent != new_parent {
            if let Some(old) = old_parent {
                self.tx.update(old, |p| p.num_children -= 1)?;
            }
            if let Some(new) = new_parent {
                self.tx.update(new, |p| p.num_children += 1)?;
            }
        }
        debug!(id, from = %node.full_name, to = %new_full_name, rows = count, "relocated subtree");
        self.topic(id)
    }

    /// Pair every same-named descendant of `node` with its counterpart under
    /// `survivor`. Children without a counterpart move instead.
    ///
    /// Fails when a counterpart lies inside the losing subtree, which happens
    /// when merging into an ancestor whose names repeat below the node.
    fn merge_plan(&self, node: &Topic, survivor: &Topic) -> Result<MergePlan> {
        let mut merged = vec![MergePair {
            losing: node.id,
            surviving: survivor.id,
        }];
        let mut moved = Vec::new();
        let mut examine = vec![(node.clone(), survivor.clone())];

        while let Some((losing, surviving)) = examine.pop() {
            for child in self.children_of(Some(&losing)) {
                let counterpart = self
                    .tx
                    .get_by_full_name(&self.join(Some(&surviving), &child.name))
                    .cloned();
                match counterpart {
                    Some(counterpart) if self.within(&counterpart, node) => {
                        return Err(TreeError::CycleRejected {
                            node: child.id,
                            target: counterpart.id,
                        });
                    }
                    Some(counterpart) => {
                        merged.push(MergePair {
                            losing: child.id,
                            surviving: counterpart.id,
                        });
                        examine.push((child, counterpart));
                    }
                    None => moved.push(MovePair {
                        node: child.id,
                        new_parent: Some(surviving.id),
                    }),
                }
            }
        }
        Ok(MergePlan { merged, moved })
    }

    /// Copy attributes the survivor does not already have.
    fn carry_meta(&mut self, pair: MergePair) -> Result<()> {
        let losing = self.topic(pair.losing)?;
        if losing.meta.is_empty() {
            return Ok(());
        }
        self.tx.update(pair.surviving, |survivor| {
            for (key, value) in losing.meta {
                survivor.meta.entry(key).or_insert(value);
            }
        })
    }
}

impl TopicTree {
    /// Move `id` (with its subtree) under `new_parent`, or to the root level.
    ///
    /// Moving to the current parent is a no-op. A same-named node at the
    /// destination is a [`TreeError::DuplicateName`]; use
    /// [`merge_to`](Self::merge_to) to fold the two together instead.
    pub fn move_to(&mut self, id: TopicId, new_parent: Option<TopicId>) -> Result<Topic> {
        let (mut edit, listeners) = self.edit();
        let node = edit.topic(id)?;
        let target = new_parent.map(|p| edit.topic(p)).transpose()?;
        edit.check_cycle(&node, target.as_ref())?;
        if edit.parent_id(&node) == new_parent {
            return Ok(node);
        }
        if let Some(existing) = edit.colliding(target.as_ref(), &node.name, id) {
            return Err(TreeError::DuplicateName {
                full_name: existing.full_name,
            });
        }

        listeners.emit(&TreeEvent::PreMove(vec![MovePair {
            node: id,
            new_parent,
        }]));
        let slot = edit.default_slot();
        let moved = edit.relocate(id, new_parent, None, slot)?;
        edit.commit();
        info!(id, full_name = %moved.full_name, "moved topic");
        Ok(moved)
    }

    /// Move `id` under `new_parent`, merging into a same-named node there.
    ///
    /// Without a collision this behaves like [`move_to`](Self::move_to).
    /// With one, the node's subtree is folded into the existing node: paired
    /// same-named descendants merge recursively, the rest are moved under
    /// their survivors, and every losing node is deleted.
    pub fn merge_to(&mut self, id: TopicId, new_parent: Option<TopicId>) -> Result<Relocation> {
        self.merge_as(id, new_parent, None)
    }

    /// Rename `id`. Descendants' full names follow.
    ///
    /// Under sorted ordering the node is repositioned among its siblings;
    /// under insertion ordering it keeps its place.
    pub fn rename(&mut self, id: TopicId, new_name: &str) -> Result<Topic> {
        let (mut edit, _) = self.edit();
        edit.check_name(new_name)?;
        let node = edit.topic(id)?;
        if node.name == new_name {
            return Ok(node);
        }
        let parent = edit.parent_of(&node);
        if let Some(existing) = edit.colliding(parent.as_ref(), new_name, id) {
            return Err(TreeError::DuplicateName {
                full_name: existing.full_name,
            });
        }
        let slot = edit.rename_slot();
        let renamed = edit.relocate(id, parent.map(|p| p.id), Some(new_name), slot)?;
        edit.commit();
        info!(id, from = %node.full_name, to = %renamed.full_name, "renamed topic");
        Ok(renamed)
    }

    /// Relocate `id` under `new_parent` as `new_name` (default: its own name),
    /// merging on collision.
    pub(crate) fn merge_as(
        &mut self,
        id: TopicId,
        new_parent: Option<TopicId>,
        new_name: Option<&str>,
    ) -> Result<Relocation> {
        let (mut edit, listeners) = self.edit();
        if let Some(name) = new_name {
            edit.check_name(name)?;
        }
        let node = edit.topic(id)?;
        let name = new_name.unwrap_or(&node.name).to_string();
        let target = new_parent.map(|p| edit.topic(p)).transpose()?;
        edit.check_cycle(&node, target.as_ref())?;

        let same_parent = edit.parent_id(&node) == new_parent;
        if same_parent && name == node.name {
            return Ok(Relocation::unchanged(id));
        }

        let Some(survivor) = edit.colliding(target.as_ref(), &name, id) else {
            let pair = MovePair { node: id, new_parent };
            let slot = if same_parent {
                edit.rename_slot()
            } else {
                edit.default_slot()
            };
            if !same_parent {
                listeners.emit(&TreeEvent::PreMove(vec![pair]));
            }
            let moved = edit.relocate(id, new_parent, Some(&name), slot)?;
            edit.commit();
            info!(id, full_name = %moved.full_name, "moved topic");
            return Ok(Relocation {
                survivor: id,
                merged: Vec::new(),
                moved: if same_parent { Vec::new() } else { vec![pair] },
            });
        };

        let plan = edit.merge_plan(&node, &survivor)?;
        listeners.emit(&TreeEvent::PreMerge(plan.merged.clone()));
        if !plan.moved.is_empty() {
            listeners.emit(&TreeEvent::PreMove(plan.moved.clone()));
        }

        for pair in &plan.moved {
            let slot = edit.default_slot();
            edit.relocate(pair.node, pair.new_parent, None, slot)?;
        }
        for &pair in &plan.merged {
            edit.carry_meta(pair)?;
        }
        // Only losing nodes are left under `id` now.
        edit.remove_subtree(id)?;
        edit.commit();

        info!(
            id,
            survivor = survivor.id,
            merged = plan.merged.len(),
            moved = plan.moved.len(),
            full_name = %survivor.full_name,
            "merged topic"
        );
        Ok(Relocation {
            survivor: survivor.id,
            merged: plan.merged,
            moved: plan.moved,
        })
    }
}

impl Edit<'_> {
    pub(crate) fn rename_slot(&self) -> Slot {
        match self.ordering {
            acacia_config::SiblingOrder::Sorted => Slot::Sorted,
            acacia_config::SiblingOrder::Insertion => Slot::Keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with(paths: &[&str]) -> TopicTree {
        let mut tree = TopicTree::new();
        for path in paths {
            tree.get_or_create_by_full_name(path).unwrap();
        }
        tree
    }

    fn id(tree: &TopicTree, full_name: &str) -> TopicId {
        tree.get_by_full_name(full_name).unwrap().id()
    }

    #[test]
    fn move_rewrites_subtree() {
        let mut tree = tree_with(&["a/b/c", "x"]);
        let b = id(&tree, "a/b");
        let x = id(&tree, "x");
        let moved = tree.move_to(b, Some(x)).unwrap();
        assert_eq!(moved.full_name(), "x/b");
        assert_eq!(moved.depth(), 2);
        assert_eq!(tree.get_by_full_name("x/b/c").unwrap().depth(), 3);
        assert!(tree.get_by_full_name("a/b").unwrap_err().is_not_found());
        assert_eq!(tree.get_by_full_name("a").unwrap().num_children(), 0);
        assert_eq!(tree.get(x).unwrap().num_children(), 1);
        assert!(tree.check_invariants().is_empty(), "{:?}", tree.check_invariants());
    }

    #[test]
    fn move_to_root_level() {
        let mut tree = tree_with(&["a/b/c"]);
        let b = id(&tree, "a/b");
        let moved = tree.move_to(b, None).unwrap();
        assert!(moved.is_root());
        assert_eq!(tree.get_by_full_name("b/c").unwrap().depth(), 2);
        assert!(tree.check_invariants().is_empty());
    }

    #[test]
    fn move_to_current_parent_is_noop() {
        let mut tree = tree_with(&["a/b"]);
        let a = id(&tree, "a");
        let b = id(&tree, "a/b");
        let before: Vec<Topic> = tree.iter().cloned().collect();
        tree.move_to(b, Some(a)).unwrap();
        let after: Vec<Topic> = tree.iter().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn cycle_is_rejected() {
        let mut tree = tree_with(&["a/b/c"]);
        let a = id(&tree, "a");
        let c = id(&tree, "a/b/c");
        assert!(tree.move_to(a, Some(c)).unwrap_err().is_cycle());
        assert!(tree.move_to(a, Some(a)).unwrap_err().is_cycle());
        assert!(tree.merge_to(a, Some(c)).unwrap_err().is_cycle());
    }

    #[test]
    fn similar_prefix_is_not_a_cycle() {
        let mut tree = tree_with(&["a/b", "ab"]);
        let a = id(&tree, "a");
        let ab = id(&tree, "ab");
        tree.move_to(a, Some(ab)).unwrap();
        assert!(tree.get_by_full_name("ab/a/b").is_ok());
    }

    #[test]
    fn rename_updates_descendants_and_order() {
        let mut tree = tree_with(&["a/b/c", "m", "z"]);
        let a = id(&tree, "a");
        tree.rename(a, "q").unwrap();
        assert_eq!(tree.get_by_full_name("q/b/c").unwrap().depth(), 3);
        let roots: Vec<_> = tree.roots().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(roots, vec!["m", "q", "z"]);
        assert!(tree.check_invariants().is_empty(), "{:?}", tree.check_invariants());
    }

    #[test]
    fn rename_to_sibling_name_fails() {
        let mut tree = tree_with(&["a/b", "a/c"]);
        let b = id(&tree, "a/b");
        assert!(tree.rename(b, "c").unwrap_err().is_duplicate());
        assert!(matches!(
            tree.rename(b, "x/y"),
            Err(TreeError::InvalidName { .. })
        ));
    }

    #[test]
    fn merge_carries_missing_meta() {
        let mut tree = tree_with(&["a/t", "t"]);
        let losing = id(&tree, "a/t");
        let surviving = id(&tree, "t");
        tree.set_meta(losing, "color", &1u32).unwrap();
        tree.set_meta(losing, "size", &2u32).unwrap();
        tree.set_meta(surviving, "color", &9u32).unwrap();

        let outcome = tree.merge_to(losing, None).unwrap();
        assert_eq!(outcome.survivor, surviving);
        let survivor = tree.get(surviving).unwrap();
        assert_eq!(survivor.get_meta::<u32>("color"), Some(&9));
        assert_eq!(survivor.get_meta::<u32>("size"), Some(&2));
    }

    #[test]
    fn merge_as_rename_into_sibling() {
        let mut tree = tree_with(&["p/old/k", "p/new"]);
        let old = id(&tree, "p/old");
        let p = id(&tree, "p");
        let outcome = tree.merge_as(old, Some(p), Some("new")).unwrap();
        assert_eq!(outcome.survivor, id(&tree, "p/new"));
        assert!(tree.get_by_full_name("p/new/k").is_ok());
        assert_eq!(tree.get(p).unwrap().num_children(), 1);
        assert!(tree.check_invariants().is_empty());
    }
}
