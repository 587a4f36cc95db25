//! Error types for topic tree operations.

use acacia_config::ConfigError;
use thiserror::Error;

use crate::tree::SiblingPos;
use crate::TopicId;

/// Errors that can occur while reading or mutating a [`TopicTree`](crate::TopicTree).
///
/// Every mutating operation is all-or-nothing: when one of these is returned
/// from a mutation, the tree is exactly as it was before the call.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TreeError {
    /// Full-name or id lookup miss.
    #[error("Topic not found: {what}")]
    NotFound { what: String },

    /// Two siblings (and therefore two full names) would share a name.
    #[error("Duplicate topic name: '{full_name}' already exists")]
    DuplicateName { full_name: String },

    /// The fixed-width path encoding cannot represent the requested position.
    #[error("Path overflow: {reason}")]
    PathOverflow { reason: String },

    /// A node cannot be moved or merged under itself or its own descendant.
    #[error("Cannot relocate topic {node} under its own subtree (target {target})")]
    CycleRejected { node: TopicId, target: TopicId },

    /// An explicit sibling position was requested while siblings are kept
    /// in name order.
    #[error("Invalid position {pos:?}: siblings are kept in name order")]
    InvalidPosition { pos: SiblingPos },

    /// The name is empty or contains the separator.
    #[error("Invalid topic name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TreeError {
    pub(crate) fn not_found_id(id: TopicId) -> Self {
        Self::NotFound {
            what: format!("id {id}"),
        }
    }

    pub(crate) fn not_found_name(full_name: &str) -> Self {
        Self::NotFound {
            what: format!("'{full_name}'"),
        }
    }

    /// Lookup miss; the caller can usually fall back to creating.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Name collision; the caller may retry with `merge_to` or another name.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateName { .. })
    }

    /// Encoding capacity exhausted; requires widening the path encoding.
    pub fn is_overflow(&self) -> bool {
        matches!(self, Self::PathOverflow { .. })
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CycleRejected { .. })
    }

    pub fn is_invalid_position(&self) -> bool {
        matches!(self, Self::InvalidPosition { .. })
    }
}

/// Result type for topic tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;
