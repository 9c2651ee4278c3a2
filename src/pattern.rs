//! Glob-to-regex translation for ignore patterns.
//!
//! A pattern is compiled once into a [`PatternMatcher`] and then tested
//! against `/`-separated paths relative to the rule set's base directory.

use crate::error::{Error, Result};
use regex::Regex;

/// How a compiled pattern is positioned against a candidate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Leading `/`: must match from the start of the relative path.
    Root,
    /// Contains `/`: may start at the root or right after any `/`.
    Path,
    /// No `/`: matched against every individual path segment.
    Segment,
}

/// A single ignore pattern compiled into a path predicate.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    anchor: Anchor,
    regex: Regex,
}

impl PatternMatcher {
    /// Compiles `pattern` (negation and dir-only markers already stripped).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the translated regex cannot be
    /// built, which in practice only happens when it exceeds the size limit.
    pub fn new(pattern: &str) -> Result<Self> {
        let (anchor, expression) = if let Some(rest) = pattern.strip_prefix('/') {
            (Anchor::Root, format!("^(?:{})(?:/|$)", glob_to_regex(rest)))
        } else if pattern.contains('/') {
            (
                Anchor::Path,
                format!("(?:^|/)(?:{})(?:/|$)", glob_to_regex(pattern)),
            )
        } else {
            (Anchor::Segment, format!("^(?:{})$", glob_to_regex(pattern)))
        };

        let regex =
            Regex::new(&expression).map_err(|e| Error::invalid_pattern(pattern, e.to_string()))?;

        Ok(Self { anchor, regex })
    }

    /// Returns how this pattern is anchored.
    #[must_use]
    pub const fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Tests a `/`-separated path relative to the base directory.
    #[must_use]
    pub fn is_match(&self, relative_path: &str) -> bool {
        match self.anchor {
            Anchor::Root | Anchor::Path => self.regex.is_match(relative_path),
            Anchor::Segment => relative_path
                .split('/')
                .any(|segment| self.regex.is_match(segment)),
        }
    }
}

/// Translates a glob into an unanchored regex fragment.
///
/// The literal text is escaped first, then `**` becomes `.*`, `*` becomes
/// `[^/]*` and `?` becomes `[^/]`.
#[must_use]
pub fn glob_to_regex(pattern: &str) -> String {
    // `.*` carries no backslash, so the single-star pass cannot touch it.
    regex::escape(pattern)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", "[^/]")
}
