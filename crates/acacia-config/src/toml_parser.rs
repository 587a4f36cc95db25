//! TOML configuration parser for topics.toml.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::split_full_name;

/// Default full-name separator.
pub const DEFAULT_SEPARATOR: &str = "/";

/// Default number of base-36 characters per path step (1.6M siblings per parent).
pub const DEFAULT_STEP_LEN: usize = 4;

/// Default maximum encoded path length (63 levels at the default step).
pub const DEFAULT_MAX_PATH_LEN: usize = 255;

/// Largest supported step length; 36^8 still fits comfortably in a `u64`.
pub const MAX_STEP_LEN: usize = 8;

/// How new siblings are ordered under a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiblingOrder {
    /// New nodes are appended after the current last sibling.
    Insertion,
    /// Siblings are kept in ascending name order (default).
    #[default]
    Sorted,
}

/// What a collaborator should do when a relocation target already holds a
/// same-named node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Fail with a duplicate-name error (default, safest).
    #[default]
    Reject,
    /// Collapse the colliding subtrees into one.
    Merge,
}

/// Parsed and validated tree configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    /// Separator placed between names in a full name.
    pub separator: String,
    /// Sibling placement policy.
    pub ordering: SiblingOrder,
    /// Characters per encoded path step.
    pub step_len: usize,
    /// Maximum encoded path length.
    pub max_path_len: usize,
    /// Default collision policy for collaborator moves.
    pub on_collision: CollisionPolicy,
    /// Seed full names, as written in the config.
    seed: Vec<String>,
}

/// A single seed topic with its ancestors resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedEntry {
    /// Normalized full name (e.g. "science/physics")
    pub full_name: String,
    /// Name segments from the root down
    pub segments: Vec<String>,
}

impl SeedEntry {
    /// Tree depth (1 = root).
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The node's own name.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }
}

/// Raw TOML structure.
#[derive(Debug, Deserialize)]
struct RawTreeConfig {
    separator: Option<String>,
    /// "insertion" or "sorted" (default)
    ordering: Option<SiblingOrder>,
    step_len: Option<usize>,
    max_path_len: Option<usize>,
    /// "reject" (default) or "merge"
    on_collision: Option<CollisionPolicy>,
    seed: Option<RawSeed>,
}

#[derive(Debug, Deserialize)]
struct RawSeed {
    paths: Vec<String>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            ordering: SiblingOrder::default(),
            step_len: DEFAULT_STEP_LEN,
            max_path_len: DEFAULT_MAX_PATH_LEN,
            on_collision: CollisionPolicy::default(),
            seed: Vec::new(),
        }
    }
}

impl TreeConfig {
    /// Parse from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::Io(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_str(&content)
    }

    /// Parse from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawTreeConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let config = Self {
            separator: raw.separator.unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
            ordering: raw.ordering.unwrap_or_default(),
            step_len: raw.step_len.unwrap_or(DEFAULT_STEP_LEN),
            max_path_len: raw.max_path_len.unwrap_or(DEFAULT_MAX_PATH_LEN),
            on_collision: raw.on_collision.unwrap_or_default(),
            seed: raw.seed.map(|s| s.paths).unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_ordering(mut self, ordering: SiblingOrder) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_step_len(mut self, step_len: usize) -> Self {
        self.step_len = step_len;
        self
    }

    pub fn with_max_path_len(mut self, max_path_len: usize) -> Self {
        self.max_path_len = max_path_len;
        self
    }

    pub fn with_on_collision(mut self, policy: CollisionPolicy) -> Self {
        self.on_collision = policy;
        self
    }

    /// Append seed full names.
    pub fn with_seed<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seed.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Seed full names exactly as configured.
    pub fn seed_paths(&self) -> &[String] {
        &self.seed
    }

    /// Check every field against the encoder's limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.separator.is_empty() {
            return Err(ConfigError::Validation("Empty separator not allowed".into()));
        }
        if self.step_len == 0 || self.step_len > MAX_STEP_LEN {
            return Err(ConfigError::Validation(format!(
                "Invalid step_len {}: expected 1..={}",
                self.step_len, MAX_STEP_LEN
            )));
        }
        if self.max_path_len < self.step_len {
            return Err(ConfigError::Validation(format!(
                "Invalid max_path_len {}: must be at least step_len ({})",
                self.max_path_len, self.step_len
            )));
        }
        for path in &self.seed {
            if split_full_name(path, &self.separator).is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Invalid seed path '{}': no non-empty segment",
                    path
                )));
            }
        }
        Ok(())
    }

    /// Expand seed paths to include all ancestor topics.
    ///
    /// e.g., "a/b/c" expands to ["a", "a/b", "a/b/c"]. The result is
    /// deduplicated and ordered so every parent precedes its children.
    pub fn seed_entries(&self) -> Vec<SeedEntry> {
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut entries: Vec<SeedEntry> = Vec::new();

        for path in &self.seed {
            let segments: Vec<String> = split_full_name(path, &self.separator)
                .into_iter()
                .map(str::to_string)
                .collect();

            for depth in 1..=segments.len() {
                let prefix = segments[..depth].to_vec();
                if seen.insert(prefix.clone()) {
                    entries.push(SeedEntry {
                        full_name: prefix.join(&self.separator),
                        segments: prefix,
                    });
                }
            }
        }

        // Lexicographic segment order puts parents first
        entries.sort_by(|a, b| a.segments.cmp(&b.segments));
        entries
    }
}

/// Errors during config parsing.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),
    /// TOML parse error
    #[error("Parse error: {0}")]
    Parse(String),
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}
