//! Row storage with path and full-name indices.
//!
//! `TopicStore` holds the rows plus two indices: an ordered path index (so a
//! subtree is one contiguous range scan) and a hash index on the
//! denormalized full name (so full-path lookup is O(1)).
//!
//! All writes go through a [`Transaction`], which journals the prior state of
//! every touched row. Dropping a transaction without calling
//! [`Transaction::commit`] restores that state, indices included.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::{Bound, Deref};

use tracing::warn;

use crate::codec::PAST_STEP;
use crate::error::{Result, TreeError};
use crate::topic::Topic;
use crate::TopicId;

#[derive(Clone, Debug, Default)]
pub struct TopicStore {
    rows: HashMap<TopicId, Topic>,
    by_path: BTreeMap<String, TopicId>,
    by_full_name: HashMap<String, TopicId>,
    last_id: TopicId,
}

impl TopicStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn get(&self, id: TopicId) -> Option<&Topic> {
        self.rows.get(&id)
    }

    pub fn get_by_path(&self, path: &str) -> Option<&Topic> {
        self.by_path.get(path).and_then(|id| self.rows.get(id))
    }

    /// Exact lookup on the denormalized full name.
    pub fn get_by_full_name(&self, full_name: &str) -> Option<&Topic> {
        self.by_full_name.get(full_name).and_then(|id| self.rows.get(id))
    }

    /// All rows in path order.
    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.by_path.values().filter_map(|id| self.rows.get(id))
    }

    /// The row at `path` and everything below it, in path order.
    pub fn subtree<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Topic> + 'a {
        self.by_path
            .range::<str, _>((Bound::Included(path), Bound::Unbounded))
            .take_while(move |(p, _)| p.starts_with(path))
            .filter_map(|(_, id)| self.rows.get(id))
    }

    /// Direct children of the node at `parent` (`""` for roots).
    ///
    /// Skips over each child's subtree with a seek, so the cost is
    /// proportional to the number of children, not the subtree size.
    pub fn children(&self, parent: &str, child_len: usize) -> Vec<&Topic> {
        let mut out = Vec::new();
        let mut cursor = Bound::Excluded(parent.to_string());
        while let Some((path, id)) = self
            .by_path
            .range::<String, _>((cursor.as_ref(), Bound::Unbounded))
            .next()
        {
            if !path.starts_with(parent) {
                break;
            }
            if path.len() == child_len
                && let Some(row) = self.rows.get(id)
            {
                out.push(row);
            }
            cursor = Bound::Excluded(format!("{path}{PAST_STEP}"));
        }
        out
    }

    /// Start a journaled write.
    pub fn begin(&mut self) -> Transaction<'_> {
        Transaction {
            store: self,
            journal: Vec::new(),
            committed: false,
        }
    }

    fn add_indices(&mut self, row: &Topic) -> Result<()> {
        if let Some(&other) = self.by_full_name.get(&row.full_name)
            && other != row.id
        {
            return Err(TreeError::DuplicateName {
                full_name: row.full_name.clone(),
            });
        }
        if let Some(&other) = self.by_path.get(&row.path)
            && other != row.id
        {
            return Err(TreeError::PathOverflow {
                reason: format!("path {} already allocated to topic {}", row.path, other),
            });
        }
        self.by_full_name.insert(row.full_name.clone(), row.id);
        self.by_path.insert(row.path.clone(), row.id);
        Ok(())
    }

    fn remove_indices(&mut self, row: &Topic) {
        if self.by_path.get(&row.path) == Some(&row.id) {
            self.by_path.remove(&row.path);
        }
        if self.by_full_name.get(&row.full_name) == Some(&row.id) {
            self.by_full_name.remove(&row.full_name);
        }
    }
}

/// Prior state of a row touched by a transaction.
#[derive(Debug)]
enum Undo {
    /// Row did not exist before.
    Absent(TopicId),
    /// Row existed with this content.
    Present(Topic),
}

impl Undo {
    fn id(&self) -> TopicId {
        match self {
            Undo::Absent(id) => *id,
            Undo::Present(row) => row.id,
        }
    }
}

/// An all-or-nothing unit of work over a [`TopicStore`].
///
/// Reads go through `Deref` and see the transaction's own writes.
#[derive(Debug)]
pub struct Transaction<'a> {
    store: &'a mut TopicStore,
    journal: Vec<Undo>,
    committed: bool,
}

impl Deref for Transaction<'_> {
    type Target = TopicStore;

    fn deref(&self) -> &TopicStore {
        self.store
    }
}

impl Transaction<'_> {
    pub fn next_id(&mut self) -> TopicId {
        self.store.last_id += 1;
        self.store.last_id
    }

    /// Insert a new row. Fails on a full-name or path collision.
    pub fn insert(&mut self, row: Topic) -> Result<()> {
        self.store.add_indices(&row)?;
        self.journal.push(Undo::Absent(row.id));
        self.store.rows.insert(row.id, row);
        Ok(())
    }

    /// Apply `f` to one row without touching its path or full name.
    pub fn update(&mut self, id: TopicId, f: impl FnOnce(&mut Topic)) -> Result<()> {
        let row = self.store.rows.get_mut(&id).ok_or_else(|| TreeError::not_found_id(id))?;
        self.journal.push(Undo::Present(row.clone()));
        f(row);
        debug_assert_eq!(self.store.by_path.get(&row.path), Some(&id));
        Ok(())
    }

    /// Replace a batch of existing rows at once.
    ///
    /// All old index entries are dropped before any new one is added, so
    /// rows in the batch may trade paths or full names with each other.
    pub fn rewrite(&mut self, rows: Vec<Topic>) -> Result<()> {
        for row in &rows {
            let old = self
                .store
                .rows
                .get(&row.id)
                .cloned()
                .ok_or_else(|| TreeError::not_found_id(row.id))?;
            self.store.remove_indices(&old);
            self.journal.push(Undo::Present(old));
        }
        for row in rows {
            self.store.add_indices(&row)?;
            self.store.rows.insert(row.id, row);
        }
        Ok(())
    }

    /// Remove a row, returning it.
    pub fn remove(&mut self, id: TopicId) -> Result<Topic> {
        let row = self.store.rows.remove(&id).ok_or_else(|| TreeError::not_found_id(id))?;
        self.store.remove_indices(&row);
        self.journal.push(Undo::Present(row.clone()));
        Ok(row)
    }

    /// Keep every write made so far.
    pub fn commit(mut self) {
        self.committed = true;
        self.journal.clear();
    }

    fn rollback(&mut self) {
        // First journal entry per id is the state before the transaction.
        let mut before: Vec<Undo> = Vec::new();
        let mut seen = HashSet::new();
        for undo in self.journal.drain(..) {
            if seen.insert(undo.id()) {
                before.push(undo);
            }
        }
        warn!(rows = before.len(), "rolling back topic transaction");

        for undo in &before {
            if let Some(current) = self.store.rows.remove(&undo.id()) {
                self.store.remove_indices(&current);
            }
        }
        for undo in before {
            if let Undo::Present(row) = undo {
                self.store.by_path.insert(row.path.clone(), row.id);
                self.store.by_full_name.insert(row.full_name.clone(), row.id);
                self.store.rows.insert(row.id, row);
            }
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.journal.is_empty() {
            self.rollback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: TopicId, path: &str, full_name: &str) -> Topic {
        let name = full_name.rsplit('/').next().unwrap().to_string();
        Topic::new(id, name, path.into(), path.len() / 4, full_name.into())
    }

    fn sample_store() -> TopicStore {
        let mut store = TopicStore::new();
        let mut tx = store.begin();
        for (path, name) in [
            ("0001", "a"),
            ("00010001", "a/b"),
            ("000100010001", "a/b/c"),
            ("00010002", "a/x"),
            ("0002", "c"),
        ] {
            let id = tx.next_id();
            tx.insert(row(id, path, name)).unwrap();
        }
        tx.commit();
        store
    }

    #[test]
    fn subtree_is_contiguous_and_ordered() {
        let store = sample_store();
        let names: Vec<_> = store.subtree("0001").map(|t| t.full_name()).collect();
        assert_eq!(names, vec!["a", "a/b", "a/b/c", "a/x"]);
    }

    #[test]
    fn children_skip_grandchildren() {
        let store = sample_store();
        let kids: Vec<_> = store.children("0001", 8).iter().map(|t| t.full_name()).collect();
        assert_eq!(kids, vec!["a/b", "a/x"]);
        let roots: Vec<_> = store.children("", 4).iter().map(|t| t.full_name()).collect();
        assert_eq!(roots, vec!["a", "c"]);
        assert!(store.children("0002", 8).is_empty());
    }

    #[test]
    fn insert_rejects_duplicate_full_name() {
        let mut store = sample_store();
        let mut tx = store.begin();
        let id = tx.next_id();
        let err = tx.insert(row(id, "0003", "a")).unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let mut store = sample_store();
        let before: Vec<Topic> = store.iter().cloned().collect();
        {
            let mut tx = store.begin();
            let a = tx.get_by_full_name("a").unwrap().id();
            tx.update(a, |t| t.num_children = 99).unwrap();
            let c = tx.get_by_full_name("c").unwrap().id();
            tx.remove(c).unwrap();
            let id = tx.next_id();
            tx.insert(row(id, "0003", "d")).unwrap();
        }
        let after: Vec<Topic> = store.iter().cloned().collect();
        assert_eq!(before, after);
        assert!(store.get_by_full_name("d").is_none());
        assert!(store.get_by_path("0002").is_some());
    }

    #[test]
    fn rewrite_allows_swapping_paths() {
        let mut store = sample_store();
        let mut tx = store.begin();
        let mut b = tx.get_by_full_name("a/b").unwrap().clone();
        let mut x = tx.get_by_full_name("a/x").unwrap().clone();
        std::mem::swap(&mut b.path, &mut x.path);
        tx.rewrite(vec![b, x]).unwrap();
        tx.commit();
        assert_eq!(store.get_by_path("00010001").unwrap().full_name(), "a/x");
        assert_eq!(store.get_by_path("00010002").unwrap().full_name(), "a/b");
    }

    #[test]
    fn failed_rewrite_rolls_back_indices() {
        let mut store = sample_store();
        {
            let mut tx = store.begin();
            let mut b = tx.get_by_full_name("a/b").unwrap().clone();
            b.full_name = "c".into();
            assert!(tx.rewrite(vec![b]).unwrap_err().is_duplicate());
        }
        assert_eq!(store.get_by_full_name("a/b").unwrap().path(), "00010001");
        assert_eq!(store.get_by_full_name("c").unwrap().path(), "0002");
    }
}
