//! Full-name lookup and get-or-create.
//!
//! Callers address topics by full name (`"science/physics/optics"`). Input is
//! normalized before use: empty segments from leading, trailing or doubled
//! separators are dropped, so `"/science//physics/"` is `"science/physics"`.

use acacia_config::{normalize_full_name, split_full_name};
use tracing::debug;

use crate::error::{Result, TreeError};
use crate::topic::Topic;
use crate::{TopicId, TopicTree};

impl TopicTree {
    /// Normalize `full_name` with this tree's separator.
    pub fn normalize(&self, full_name: &str) -> Option<String> {
        normalize_full_name(full_name, &self.config.separator)
    }

    /// Exact lookup by (normalized) full name.
    pub fn get_by_full_name(&self, full_name: &str) -> Result<&Topic> {
        let normalized = self
            .normalize(full_name)
            .ok_or_else(|| TreeError::not_found_name(full_name))?;
        self.store
            .get_by_full_name(&normalized)
            .ok_or_else(|| TreeError::not_found_name(&normalized))
    }

    /// The node at `full_name` and all its descendants, in pre-order.
    pub fn get_subtree(&self, full_name: &str) -> Result<Vec<&Topic>> {
        let root = self.get_by_full_name(full_name)?;
        Ok(self.store.subtree(&root.path).collect())
    }

    /// Resolve `full_name`, creating every missing node along the way.
    ///
    /// Returns the leaf and whether anything was created. Creation is
    /// all-or-nothing: if any segment fails (invalid name, overflow), none of
    /// the new ancestors are kept.
    pub fn get_or_create_by_full_name(&mut self, full_name: &str) -> Result<(Topic, bool)> {
        let Some(normalized) = self.normalize(full_name) else {
            return Err(TreeError::InvalidName {
                name: full_name.to_string(),
                reason: "no non-empty segment".into(),
            });
        };
        if let Some(existing) = self.store.get_by_full_name(&normalized) {
            return Ok((existing.clone(), false));
        }

        let (mut edit, _) = self.edit();
        let separator = edit.separator;
        let mut parent: Option<Topic> = None;
        let mut created = 0usize;
        for segment in split_full_name(&normalized, separator) {
            let existing = edit
                .tx
                .get_by_full_name(&edit.join(parent.as_ref(), segment))
                .cloned();
            let node = match existing {
                Some(node) => node,
                None => {
                    let slot = edit.default_slot();
                    created += 1;
                    edit.place(parent.as_ref().map(Topic::id), segment, slot)?
                }
            };
            parent = Some(node);
        }
        edit.commit();
        debug!(full_name = %normalized, created, "resolved topic");

        let leaf = parent.ok_or_else(|| TreeError::not_found_name(&normalized))?;
        Ok((leaf, created > 0))
    }

    /// Rebuild the full name of `id` from its ancestors' names.
    ///
    /// Equal to the cached [`Topic::full_name`] whenever the tree is
    /// consistent; used to verify the cache.
    pub fn derive_full_name(&self, id: TopicId) -> Result<String> {
        let node = self.get(id)?;
        let mut names = Vec::with_capacity(node.depth);
        for depth in 1..node.depth {
            let path = self.codec.base_path(&node.path, depth);
            let ancestor = self.store.get_by_path(path).ok_or_else(|| TreeError::NotFound {
                what: format!("ancestor path {path} of topic {id}"),
            })?;
            names.push(ancestor.name.as_str());
        }
        names.push(node.name.as_str());
        Ok(names.join(&self.config.separator))
    }
}
