//! # Hierarchical Topic Trees (acacia)
//!
//! A named, single-rooted-per-node forest of topics, addressed by full name
//! (`"science/physics/optics"`) and stored with materialized paths so that
//! reads are cheap and structural edits are all-or-nothing.
//!
//! ## Design
//!
//! Every topic carries a fixed-width, base-36 path. Comparing paths as
//! strings equals pre-order traversal, and a subtree is one contiguous range:
//!
//! ```text
//! full name   path           depth
//! ─────────   ────────────   ─────
//! a           0001           1
//! a/b         00010001       2
//! a/b/c       000100010001   3
//! a/x         00010002       2
//! c           0002           1
//! ```
//!
//! Full names are cached on each row, so exact lookup is a single hash probe,
//! and move, merge and rename rewrite the cached data of the whole subtree in
//! one transaction.
//!
//! ```
//! use acacia::{TopicTree, TreeError};
//!
//! let mut tree = TopicTree::new();
//! tree.get_or_create_by_full_name("a/b/c")?;
//! tree.get_or_create_by_full_name("x/y/c")?;
//!
//! let y = tree.get_by_full_name("x/y")?.id();
//! let a = tree.get_by_full_name("a")?.id();
//! tree.move_to(y, Some(a))?;
//!
//! assert!(tree.get_by_full_name("a/y/c").is_ok());
//! assert!(tree.check_invariants().is_empty());
//! # Ok::<(), TreeError>(())
//! ```

pub mod admin;
pub mod bevy;
pub mod codec;
pub mod error;
pub mod lookup;
pub mod notify;
pub mod relocate;
pub mod render;
mod store;
pub mod topic;
pub mod tree;

pub use acacia_config::{CollisionPolicy, ConfigError, SiblingOrder, TreeConfig};
pub use admin::TopicForm;
pub use codec::{is_descendant_of, is_sibling, PathCodec, ALPHABET, BASE};
pub use error::{Result, TreeError};
pub use notify::{ListenerId, MergePair, MovePair, TreeEvent};
pub use relocate::Relocation;
pub use render::render_trunk;
pub use topic::Topic;
pub use tree::{SiblingPos, TopicTree};

/// Stable topic identity, assigned at creation and never reused.
pub type TopicId = u64;
