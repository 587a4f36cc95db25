//! Configuration for acacia topic trees.
//!
//! This crate provides:
//! - Parsing `topics.toml` configuration files into a validated [`TreeConfig`]
//! - Expansion of seed topics into a parent-before-child creation list
//! - Full-name normalization shared with the tree engine
//!
//! # Example
//!
//! ```toml
//! separator = "/"
//! ordering = "sorted"      # or "insertion"
//! step_len = 4             # characters per path step (base 36)
//! max_path_len = 255       # bounds the tree depth
//! on_collision = "reject"  # or "merge"
//!
//! [seed]
//! paths = ["science/physics", "science/biology", "arts"]
//! ```
//!
//! ```ignore
//! let config = acacia_config::TreeConfig::from_file("topics.toml")?;
//! let tree = acacia::TopicTree::from_config(config)?;
//! ```

mod toml_parser;

pub use toml_parser::{
    CollisionPolicy, ConfigError, SeedEntry, SiblingOrder, TreeConfig, DEFAULT_MAX_PATH_LEN,
    DEFAULT_SEPARATOR, DEFAULT_STEP_LEN, MAX_STEP_LEN,
};

/// Split a full name on `separator`, dropping empty segments.
///
/// Repeated, leading and trailing separators collapse, so `"a//b/"` and
/// `"/a/b"` both yield `["a", "b"]`.
///
/// ```
/// use acacia_config::split_full_name;
///
/// assert_eq!(split_full_name("///a/b//c////", "/"), vec!["a", "b", "c"]);
/// assert!(split_full_name("//", "/").is_empty());
/// ```
pub fn split_full_name<'a>(full_name: &'a str, separator: &str) -> Vec<&'a str> {
    full_name.split(separator).filter(|s| !s.is_empty()).collect()
}

/// Normalize a full name into its canonical form.
///
/// Returns `None` when no non-empty segment remains.
///
/// ```
/// use acacia_config::normalize_full_name;
///
/// assert_eq!(normalize_full_name("a///b/e//", "/").as_deref(), Some("a/b/e"));
/// assert_eq!(normalize_full_name("///", "/"), None);
/// ```
pub fn normalize_full_name(full_name: &str, separator: &str) -> Option<String> {
    let segments = split_full_name(full_name, separator);
    if segments.is_empty() {
        None
    } else {
        Some(segments.join(separator))
    }
}
