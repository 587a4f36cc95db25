//! Editing surface for administrative collaborators.
//!
//! A form-driven editor works in terms of "save this topic with this name
//! under this parent". [`TopicTree::save_topic`] turns that into a create,
//! rename, move or merge, and [`TopicTree::candidate_parents`] lists the
//! parents the form may offer.

use acacia_config::CollisionPolicy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TreeError};
use crate::notify::MovePair;
use crate::relocate::Relocation;
use crate::topic::Topic;
use crate::tree::validate_name;
use crate::{TopicId, TopicTree};

/// The editable fields of a topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicForm {
    pub name: String,
    /// `None` places the topic at the root level.
    #[serde(default)]
    pub parent: Option<TopicId>,
}

impl TopicForm {
    pub fn new(name: impl Into<String>, parent: Option<TopicId>) -> Self {
        Self {
            name: name.into(),
            parent,
        }
    }
}

impl TopicTree {
    /// Every topic `id` could be re-parented under: all topics except `id`
    /// itself and its descendants, in pre-order.
    pub fn candidate_parents(&self, id: TopicId) -> Result<Vec<&Topic>> {
        let node = self.get(id)?;
        let own = node.full_name.as_str();
        let below = format!("{own}{}", self.config.separator);
        Ok(self
            .store
            .iter()
            .filter(|t| t.full_name != own && !t.full_name.starts_with(&below))
            .collect())
    }

    /// Re-parent `id`, resolving a name collision per `policy`.
    pub fn change_parent(
        &mut self,
        id: TopicId,
        new_parent: Option<TopicId>,
        policy: CollisionPolicy,
    ) -> Result<Relocation> {
        match policy {
            CollisionPolicy::Merge => self.merge_to(id, new_parent),
            CollisionPolicy::Reject => {
                let before = self.parent(id)?.map(Topic::id);
                let moved = self.move_to(id, new_parent)?;
                let mut outcome = Relocation {
                    survivor: moved.id,
                    ..Relocation::default()
                };
                if before != new_parent {
                    outcome.moved.push(MovePair {
                        node: moved.id,
                        new_parent,
                    });
                }
                Ok(outcome)
            }
        }
    }

    /// Create (`existing == None`) or update a topic from a form.
    ///
    /// Updating applies both the new name and the new parent in one step;
    /// a collision at the destination is handled per `policy`.
    pub fn save_topic(
        &mut self,
        existing: Option<TopicId>,
        form: &TopicForm,
        policy: CollisionPolicy,
    ) -> Result<Relocation> {
        let Some(id) = existing else {
            let created = match form.parent {
                Some(parent) => self.add_child(parent, form.name.clone())?,
                None => self.add_root(form.name.clone())?,
            };
            debug!(id = created.id, full_name = %created.full_name, "saved new topic");
            return Ok(Relocation {
                survivor: created.id,
                ..Relocation::default()
            });
        };

        validate_name(&form.name, &self.config.separator)?;
        if policy == CollisionPolicy::Reject {
            let preview = self.preview_full_name(form)?;
            if let Some(clash) = self.store.get_by_full_name(&preview)
                && clash.id != id
            {
                return Err(TreeError::DuplicateName { full_name: preview });
            }
        }
        let outcome = self.merge_as(id, form.parent, Some(&form.name))?;
        debug!(
            id,
            survivor = outcome.survivor,
            merged = outcome.merged.len(),
            "saved topic"
        );
        Ok(outcome)
    }

    /// The full name a topic would get if saved with `form`.
    pub fn preview_full_name(&self, form: &TopicForm) -> Result<String> {
        Ok(match form.parent {
            Some(parent) => format!(
                "{}{}{}",
                self.get(parent)?.full_name,
                self.config.separator,
                form.name
            ),
            None => form.name.clone(),
        })
    }

    /// Re-parent with the configured default collision policy.
    pub fn change_parent_default(
        &mut self,
        id: TopicId,
        new_parent: Option<TopicId>,
    ) -> Result<Relocation> {
        let policy = self.config.on_collision;
        self.change_parent(id, new_parent, policy)
    }
}
