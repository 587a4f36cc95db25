//! The topic row: one node of the tree with its denormalized position data.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::TopicId;

/// A node in the topic tree.
///
/// Everything except `id` and `name` is owned by the tree engine: `path`,
/// `depth`, `num_children` and `full_name` are rewritten by placement,
/// move, merge and rename, and are never edited by callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub(crate) id: TopicId,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) depth: usize,
    pub(crate) num_children: usize,
    pub(crate) full_name: String,
    /// Extra attributes: key → raw bytes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) meta: BTreeMap<String, Vec<u8>>,
}

impl Topic {
    pub(crate) fn new(id: TopicId, name: String, path: String, depth: usize, full_name: String) -> Self {
        Self {
            id,
            name,
            path,
            depth,
            num_children: 0,
            full_name,
            meta: BTreeMap::new(),
        }
    }

    /// Stable identity, assigned at creation.
    #[inline]
    pub fn id(&self) -> TopicId {
        self.id
    }

    /// The node's own label.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opaque materialized path; ordering these equals pre-order traversal.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 1 for roots, parent depth + 1 otherwise.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of direct children.
    #[inline]
    pub fn num_children(&self) -> usize {
        self.num_children
    }

    /// Ancestor names and this node's name, joined by the separator.
    #[inline]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.depth == 1
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.num_children == 0
    }

    /// Get a typed attribute.
    ///
    /// Returns `None` if the key doesn't exist or the bytes don't match the
    /// type's layout.
    pub fn get_meta<T: FromBytes + KnownLayout + Immutable>(&self, key: &str) -> Option<&T> {
        let bytes = self.meta.get(key)?;
        T::ref_from_bytes(bytes).ok()
    }

    #[inline]
    pub fn get_meta_raw(&self, key: &str) -> Option<&[u8]> {
        self.meta.get(key).map(|v| v.as_slice())
    }

    #[inline]
    pub fn has_meta(&self, key: &str) -> bool {
        self.meta.contains_key(key)
    }

    /// Attribute keys, in ascending order.
    pub fn meta_keys(&self) -> impl Iterator<Item = &str> {
        self.meta.keys().map(|s| s.as_str())
    }

    pub fn meta_iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.meta.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}
