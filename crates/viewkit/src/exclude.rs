//! Post-render marker stripping.
//!
//! Views sometimes carry markers that must not reach the output, e.g. a
//! comment prefix that keeps a line inert in an editor. An
//! [`ExclusionFilter`] replaces every match of its pattern with the
//! concatenation of the match's capture groups and repeats while each pass
//! shortens the text. With nested groups a replacement can be longer than
//! its match; such a pass is kept and the filter stops there.
//!
//! ```rust
//! use viewkit::ExclusionFilter;
//!
//! let filter = ExclusionFilter::new(r"//=\s*(.+)").unwrap();
//! assert_eq!(filter.apply("keep //= visible"), "keep visible");
//! ```

use std::borrow::Cow;

use regex::{Captures, Regex};

use crate::error::RenderError;

/// Strips markers from rendered text.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    pattern: Regex,
}

impl ExclusionFilter {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Config`] if the pattern does not compile.
    pub fn new(pattern: &str) -> Result<Self, RenderError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| RenderError::Config(format!("invalid exclude pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Wraps an already compiled pattern.
    pub fn from_regex(pattern: Regex) -> Self {
        Self { pattern }
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Applies the filter until the pattern stops matching or a pass no
    /// longer shortens the text.
    pub fn apply(&self, text: &str) -> String {
        let mut current = text.to_string();
        while self.pattern.is_match(&current) {
            let next = match self.pattern.replace_all(&current, join_groups) {
                Cow::Borrowed(_) => break,
                Cow::Owned(next) => next,
            };
            let shortened = next.len() < current.len();
            current = next;
            if !shortened {
                break;
            }
        }
        current
    }
}

fn join_groups(caps: &Captures<'_>) -> String {
    caps.iter()
        .skip(1)
        .map(|group| group.map_or("", |m| m.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strips_marker() {
        let filter = ExclusionFilter::new(r"//=\s*(.+)").unwrap();
        assert_eq!(filter.apply("keep //= visible"), "keep visible");
    }

    #[test]
    fn test_no_match_is_unchanged() {
        let filter = ExclusionFilter::new(r"//=\s*(.+)").unwrap();
        assert_eq!(filter.apply("plain text"), "plain text");
    }

    #[test]
    fn test_concatenates_all_groups() {
        let filter = ExclusionFilter::new(r"<!--\s*(\w+)\s*:\s*(\w+)\s*-->").unwrap();
        assert_eq!(filter.apply("a <!-- x : y --> b"), "a xy b");
    }

    #[test]
    fn test_unmatched_optional_group_is_empty() {
        let filter = ExclusionFilter::new(r"\[(a)?(b)\]").unwrap();
        assert_eq!(filter.apply("[b][ab]"), "bab");
    }

    #[test]
    fn test_repeats_until_no_match() {
        let filter = ExclusionFilter::new(r"\((\w*)\)").unwrap();
        assert_eq!(filter.apply("((x))"), "x");
    }

    #[test]
    fn test_stops_at_fixed_point() {
        // A match whose groups reproduce it would loop forever otherwise.
        let filter = ExclusionFilter::new(r"(a)").unwrap();
        assert_eq!(filter.apply("banana"), "banana");
    }

    #[test]
    fn test_nested_groups_terminate() {
        // Group 1 is "ab" and group 2 is "a", so each pass grows the text.
        let filter = ExclusionFilter::new(r"((a)b)").unwrap();
        assert_eq!(filter.apply("ab"), "aba");
        assert_eq!(filter.apply("xaby"), "xabay");
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        assert!(matches!(
            ExclusionFilter::new("(unclosed"),
            Err(RenderError::Config(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_apply_is_idempotent(input in "[a-z /=]{0,40}") {
            let filter = ExclusionFilter::new(r"//=\s*(.+)").unwrap();
            let once = filter.apply(&input);
            prop_assert_eq!(filter.apply(&once), once.clone());
        }
    }
}
