//! Path codec for fixed-width materialized paths.
//!
//! A node's path is its parent's path extended by one fixed-width step. Each
//! step is the node's ordinal among its siblings, written in base 36 and
//! zero-padded to `step_len` characters:
//!
//! ```text
//! step_len = 4
//!
//! a        0001
//! ├─ b     0001 0001
//! │  └─ c  0001 0001 0001
//! └─ x     0001 0002
//!    └─ c  0001 0002 0001
//! c        0002
//! ```
//!
//! Because every step has the same width and the alphabet is in ASCII order,
//! plain byte-wise string comparison of two paths equals their pre-order
//! traversal order, and "descendants of X" is "paths with X as a strict prefix".

use acacia_config::{
    ConfigError, TreeConfig, DEFAULT_MAX_PATH_LEN, DEFAULT_STEP_LEN, MAX_STEP_LEN,
};

use crate::error::{Result, TreeError};

/// Step alphabet, in ascending ASCII order.
pub const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Numeric base of a step.
pub const BASE: u64 = ALPHABET.len() as u64;

/// Sorts after every step character; `path + PAST_STEP` bounds a subtree scan.
pub(crate) const PAST_STEP: char = '~';

const _: () = assert!(PAST_STEP as u8 > ALPHABET[ALPHABET.len() - 1]);

/// Static assertion: the widest step must fit in a u64.
const _: () = {
    let mut max: u64 = 1;
    let mut i = 0;
    while i < MAX_STEP_LEN {
        max = match max.checked_mul(BASE) {
            Some(v) => v,
            None => panic!("MAX_STEP_LEN steps overflow u64"),
        };
        i += 1;
    }
};

/// Encoder/decoder for materialized paths with a fixed step width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathCodec {
    step_len: usize,
    max_len: usize,
}

impl Default for PathCodec {
    fn default() -> Self {
        Self {
            step_len: DEFAULT_STEP_LEN,
            max_len: DEFAULT_MAX_PATH_LEN,
        }
    }
}

impl PathCodec {
    /// Create a codec. `step_len` must be in `1..=MAX_STEP_LEN` and
    /// `max_len` must hold at least one step.
    pub fn new(step_len: usize, max_len: usize) -> Result<Self> {
        if !(1..=MAX_STEP_LEN).contains(&step_len) {
            return Err(ConfigError::Validation(format!(
                "Invalid step_len {step_len}: expected 1..={MAX_STEP_LEN}"
            ))
            .into());
        }
        if max_len < step_len {
            return Err(ConfigError::Validation(format!(
                "Invalid max_path_len {max_len}: must be at least step_len ({step_len})"
            ))
            .into());
        }
        Ok(Self { step_len, max_len })
    }

    pub fn from_config(config: &TreeConfig) -> Result<Self> {
        Self::new(config.step_len, config.max_path_len)
    }

    #[inline]
    pub fn step_len(&self) -> usize {
        self.step_len
    }

    #[inline]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Largest ordinal a single step can hold.
    #[inline]
    pub fn max_ordinal(&self) -> u64 {
        BASE.checked_pow(self.step_len as u32)
            .map_or(u64::MAX, |cap| cap - 1)
    }

    /// Deepest level the encoding can represent (1 = roots only).
    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_len / self.step_len
    }

    /// Encode a sibling ordinal as one zero-padded step.
    pub fn encode_step(&self, ordinal: u64) -> Result<String> {
        if ordinal > self.max_ordinal() {
            return Err(TreeError::PathOverflow {
                reason: format!(
                    "sibling ordinal {} exceeds the {}-character step capacity ({})",
                    ordinal,
                    self.step_len,
                    self.max_ordinal()
                ),
            });
        }
        let mut buf = vec![ALPHABET[0]; self.step_len];
        let mut rest = ordinal;
        for slot in buf.iter_mut().rev() {
            *slot = ALPHABET[(rest % BASE) as usize];
            rest /= BASE;
        }
        Ok(buf.into_iter().map(char::from).collect())
    }

    /// Decode one step back to its ordinal. `None` for foreign characters
    /// or a value too large for a `u64`.
    pub fn decode_step(&self, step: &str) -> Option<u64> {
        step.bytes().try_fold(0u64, |acc, b| {
            let digit = ALPHABET.iter().position(|&c| c == b)? as u64;
            acc.checked_mul(BASE)?.checked_add(digit)
        })
    }

    /// Number of steps in `path` (its tree depth).
    #[inline]
    pub fn depth_of(&self, path: &str) -> usize {
        path.len() / self.step_len
    }

    /// The first `depth` steps of `path`.
    #[inline]
    pub fn base_path<'a>(&self, path: &'a str, depth: usize) -> &'a str {
        &path[..(depth * self.step_len).min(path.len())]
    }

    /// The parent's path, or `None` for a root path.
    pub fn parent_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let depth = self.depth_of(path);
        (depth > 1).then(|| self.base_path(path, depth - 1))
    }

    /// Ordinal of the last step (the node's position among its siblings).
    pub fn last_pos(&self, path: &str) -> u64 {
        let start = path.len().saturating_sub(self.step_len);
        self.decode_step(&path[start..]).unwrap_or(0)
    }

    /// Path of the child at `ordinal` under `parent` (or of a root when `None`).
    pub fn child_path(&self, parent: Option<&str>, ordinal: u64) -> Result<String> {
        let parent = parent.unwrap_or("");
        let path = format!("{}{}", parent, self.encode_step(ordinal)?);
        self.check_len(&path)?;
        Ok(path)
    }

    /// Replace the last step of `path` with `ordinal`.
    pub fn with_last_pos(&self, path: &str, ordinal: u64) -> Result<String> {
        let parent = self.parent_path(path);
        self.child_path(parent, ordinal)
    }

    /// The path of the next sibling after `path`.
    pub fn inc_path(&self, path: &str) -> Result<String> {
        self.with_last_pos(path, self.last_pos(path) + 1)
    }

    /// Fail if `path` is longer than the configured maximum.
    pub fn check_len(&self, path: &str) -> Result<()> {
        if path.len() > self.max_len {
            return Err(TreeError::PathOverflow {
                reason: format!(
                    "path of depth {} exceeds max_path_len {} (deepest level is {})",
                    self.depth_of(path),
                    self.max_len,
                    self.max_depth()
                ),
            });
        }
        Ok(())
    }

    /// Re-root `path` from `old_prefix` onto `new_prefix`, keeping the suffix.
    pub fn rebase(&self, path: &str, old_prefix: &str, new_prefix: &str) -> Result<String> {
        debug_assert!(path.starts_with(old_prefix));
        let rebased = format!("{}{}", new_prefix, &path[old_prefix.len()..]);
        self.check_len(&rebased)?;
        Ok(rebased)
    }
}

// =============================================================================
// Standalone path relations
// =============================================================================

/// Is `candidate` a strict descendant of `ancestor`?
///
/// ```text
/// is_descendant_of("00010002", "0001") → true
/// is_descendant_of("0001",     "0001") → false
/// is_descendant_of("0002",     "0001") → false
/// ```
#[inline]
pub fn is_descendant_of(candidate: &str, ancestor: &str) -> bool {
    candidate.len() > ancestor.len() && candidate.starts_with(ancestor)
}

/// Do two paths of the same width share a parent?
#[inline]
pub fn is_sibling(codec: &PathCodec, a: &str, b: &str) -> bool {
    a.len() == b.len() && codec.parent_path(a) == codec.parent_path(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> PathCodec {
        PathCodec::new(4, 255).unwrap()
    }

    #[test]
    fn alphabet_is_ascii_ordered() {
        assert!(ALPHABET.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn encode_pads_and_orders() {
        let c = codec();
        assert_eq!(c.encode_step(1).unwrap(), "0001");
        assert_eq!(c.encode_step(35).unwrap(), "000Z");
        assert_eq!(c.encode_step(36).unwrap(), "0010");
        // Lexicographic order follows numeric order across digit boundaries
        let steps: Vec<String> = (1..200).map(|i| c.encode_step(i).unwrap()).collect();
        assert!(steps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn decode_inverts_encode() {
        let c = codec();
        for ordinal in [0, 1, 35, 36, 1295, 1296, c.max_ordinal()] {
            let step = c.encode_step(ordinal).unwrap();
            assert_eq!(c.decode_step(&step), Some(ordinal));
        }
        assert_eq!(c.decode_step("00a1"), None);
    }

    #[test]
    fn step_overflow() {
        let c = PathCodec::new(1, 10).unwrap();
        assert_eq!(c.max_ordinal(), 35);
        assert!(c.encode_step(35).is_ok());
        assert!(c.encode_step(36).unwrap_err().is_overflow());
        assert!(c.inc_path("Z").unwrap_err().is_overflow());
    }

    #[test]
    fn rejects_unrepresentable_widths() {
        assert!(PathCodec::new(0, 10).is_err());
        assert!(PathCodec::new(MAX_STEP_LEN + 1, 255).is_err());
        assert!(PathCodec::new(4, 3).is_err());
        let widest = PathCodec::new(MAX_STEP_LEN, 255).unwrap();
        assert_eq!(widest.max_ordinal(), BASE.pow(MAX_STEP_LEN as u32) - 1);
    }

    #[test]
    fn decode_long_step_does_not_overflow() {
        let c = codec();
        assert_eq!(c.decode_step(&"Z".repeat(40)), None);
        assert_eq!(c.decode_step(&"0".repeat(40)), Some(0));
    }

    #[test]
    fn depth_overflow() {
        let c = PathCodec::new(2, 4).unwrap();
        assert_eq!(c.max_depth(), 2);
        let root = c.child_path(None, 1).unwrap();
        let child = c.child_path(Some(&root), 1).unwrap();
        assert_eq!(child, "0101");
        assert!(c.child_path(Some(&child), 1).unwrap_err().is_overflow());
    }

    #[test]
    fn structure_helpers() {
        let c = codec();
        let path = "000100020003";
        assert_eq!(c.depth_of(path), 3);
        assert_eq!(c.base_path(path, 1), "0001");
        assert_eq!(c.parent_path(path), Some("00010002"));
        assert_eq!(c.parent_path("0001"), None);
        assert_eq!(c.last_pos(path), 3);
        assert_eq!(c.inc_path(path).unwrap(), "000100020004");
        assert_eq!(c.with_last_pos(path, 36).unwrap(), "000100020010");
        assert_eq!(c.rebase(path, "00010002", "0005").unwrap(), "00050003");
    }

    #[test]
    fn descendant_and_sibling_relations() {
        let c = codec();
        assert!(is_descendant_of("00010002", "0001"));
        assert!(!is_descendant_of("0001", "0001"));
        assert!(!is_descendant_of("00020001", "0001"));
        assert!(is_sibling(&c, "00010001", "00010005"));
        assert!(is_sibling(&c, "0001", "0002"));
        assert!(!is_sibling(&c, "00010001", "00020001"));
        assert!(!is_sibling(&c, "0001", "00010001"));
    }

    #[test]
    fn preorder_matches_path_order() {
        let c = codec();
        // a, a/b, a/b/c, a/x, c  (pre-order)
        let a = c.child_path(None, 1).unwrap();
        let ab = c.child_path(Some(&a), 1).unwrap();
        let abc = c.child_path(Some(&ab), 1).unwrap();
        let ax = c.child_path(Some(&a), 2).unwrap();
        let root_c = c.child_path(None, 2).unwrap();
        let preorder = [&a, &ab, &abc, &ax, &root_c];
        assert!(preorder.windows(2).all(|w| w[0] < w[1]));
    }
}
