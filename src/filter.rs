//! Ignore rules and last-match-wins evaluation.
//!
//! Rules come from a fixed list of defaults followed by the lines of an
//! ignore file. Every rule that matches a candidate overrides the verdict of
//! the rules before it, so a later `!pattern` can re-include a path that an
//! earlier rule excluded.

use crate::error::{Error, Result};
use crate::pattern::PatternMatcher;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace, warn};

/// Patterns that are always ignored, evaluated before any ignore file rule.
pub const DEFAULT_PATTERNS: &[&str] = &[
    ".git/",
    "__pycache__/",
    "*.pyc",
    ".DS_Store",
    "node_modules/",
    ".env",
];

/// Ignore file looked up in the target directory when no override is given.
pub const DEFAULT_IGNORE_FILENAME: &str = ".compileignore";

/// One parsed line of an ignore file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRule {
    /// Glob text with the `!` prefix and trailing `/` removed
    pub pattern: String,

    /// Re-includes matching paths instead of excluding them
    pub negate: bool,

    /// Only applies to directory candidates
    pub dir_only: bool,
}

impl IgnoreRule {
    /// Parses a single ignore line.
    ///
    /// Returns `None` for blank lines, `#` comments, and lines that are
    /// empty once the markers are stripped.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (negate, rest) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let (dir_only, pattern) = match rest.strip_suffix('/') {
            Some(pattern) => (true, pattern),
            None => (false, rest),
        };

        if pattern.is_empty() {
            return None;
        }

        Some(Self {
            pattern: pattern.to_string(),
            negate,
            dir_only,
        })
    }
}

/// Ordered ignore rules bound to a base directory.
#[derive(Debug, Clone)]
pub struct RuleSet {
    base_dir: PathBuf,
    rules: Vec<IgnoreRule>,
    matchers: Vec<PatternMatcher>,
}

impl RuleSet {
    /// Builds a rule set from raw ignore lines, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if a pattern fails to compile.
    pub fn new<I, S>(base_dir: impl Into<PathBuf>, lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Vec::new();
        let mut matchers = Vec::new();

        for line in lines {
            let Some(rule) = IgnoreRule::parse(line.as_ref()) else {
                continue;
            };
            matchers.push(PatternMatcher::new(&rule.pattern)?);
            trace!(
                "Compiled rule: {}{}{}",
                if rule.negate { "!" } else { "" },
                rule.pattern,
                if rule.dir_only { "/" } else { "" }
            );
            rules.push(rule);
        }

        Ok(Self {
            base_dir: base_dir.into(),
            rules,
            matchers,
        })
    }

    /// Builds a rule set from [`DEFAULT_PATTERNS`] followed by `extra`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if a pattern fails to compile.
    pub fn with_defaults<I, S>(base_dir: impl Into<PathBuf>, extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let defaults = DEFAULT_PATTERNS.iter().map(|p| (*p).to_string());
        let extra = extra.into_iter().map(|line| line.as_ref().to_string());
        Self::new(base_dir, defaults.chain(extra))
    }

    /// Loads the defaults plus the ignore file for `base_dir`.
    ///
    /// `ignore_file` overrides `<base_dir>/.compileignore`. A missing file
    /// contributes no rules. A file that exists but cannot be read is
    /// reported and also contributes no rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if a pattern fails to compile.
    pub fn load(base_dir: impl Into<PathBuf>, ignore_file: Option<&Path>) -> Result<Self> {
        let base_dir = base_dir.into();
        let path = ignore_file.map_or_else(
            || base_dir.join(DEFAULT_IGNORE_FILENAME),
            Path::to_path_buf,
        );

        let lines: Vec<String> = match read_ignore_file(&path) {
            Ok(Some(content)) => {
                debug!("Loaded ignore file: {}", path.display());
                content.lines().map(str::to_string).collect()
            }
            Ok(None) => {
                if ignore_file.is_some() {
                    warn!("Ignore file does not exist: {}", path.display());
                } else {
                    trace!("No ignore file at {}", path.display());
                }
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to read ignore file, using defaults only: {}", e);
                Vec::new()
            }
        };

        Self::with_defaults(base_dir, lines)
    }

    /// Returns the directory all paths are matched relative to.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the parsed rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if the set holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Checks whether `path` is ignored.
    ///
    /// Relative paths are taken as relative to the base directory. Paths
    /// that resolve outside the base directory are always ignored.
    #[must_use]
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        match relative_slash_path(path, &self.base_dir) {
            Some(relative) if relative.is_empty() => false,
            Some(relative) => evaluate(self, &relative, is_dir),
            None => {
                debug!("Path outside base directory: {}", path.display());
                true
            }
        }
    }
}

/// Evaluates `relative_path` against every rule; the last match decides.
///
/// Dir-only rules are skipped entirely for non-directory candidates.
#[must_use]
pub fn evaluate(rules: &RuleSet, relative_path: &str, is_dir: bool) -> bool {
    let mut ignored = false;

    for (rule, matcher) in rules.rules.iter().zip(&rules.matchers) {
        if rule.dir_only && !is_dir {
            continue;
        }
        if matcher.is_match(relative_path) {
            ignored = !rule.negate;
        }
    }

    ignored
}

/// Expresses `path` relative to `base` with `/` separators.
///
/// Returns `None` when the path escapes `base`, and an empty string for
/// `base` itself.
pub(crate) fn relative_slash_path(path: &Path, base: &Path) -> Option<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let relative = pathdiff::diff_paths(&absolute, base)?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_string_lossy()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    Some(segments.join("/"))
}

fn read_ignore_file(path: &Path) -> Result<Option<String>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn rule_set(lines: &[&str]) -> RuleSet {
        RuleSet::new("/project", lines.iter().copied()).unwrap()
    }

    #[test]
    fn test_parse_plain_rule() {
        let rule = IgnoreRule::parse("*.log").unwrap();
        assert_eq!(rule.pattern, "*.log");
        assert!(!rule.negate);
        assert!(!rule.dir_only);
    }

    #[test]
    fn test_parse_markers() {
        let rule = IgnoreRule::parse("!build/").unwrap();
        assert_eq!(rule.pattern, "build");
        assert!(rule.negate);
        assert!(rule.dir_only);
    }

    #[test]
    fn test_parse_skips_blank_and_comments() {
        assert!(IgnoreRule::parse("").is_none());
        assert!(IgnoreRule::parse("   \t").is_none());
        assert!(IgnoreRule::parse("# comment").is_none());
        assert!(IgnoreRule::parse("  # indented comment").is_none());
        assert!(IgnoreRule::parse("/").is_none());
        assert!(IgnoreRule::parse("!").is_none());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let rule = IgnoreRule::parse("  target/  \r").unwrap();
        assert_eq!(rule.pattern, "target");
        assert!(rule.dir_only);
    }

    #[test]
    fn test_defaults_come_first() {
        let rules = RuleSet::with_defaults("/project", ["custom"]).unwrap();
        assert_eq!(rules.len(), DEFAULT_PATTERNS.len() + 1);
        assert_eq!(rules.rules()[0].pattern, ".git");
        assert_eq!(rules.rules().last().unwrap().pattern, "custom");
    }

    #[test]
    fn test_last_match_wins() {
        let rules = rule_set(&["*.log", "!important.log"]);
        assert!(!evaluate(&rules, "important.log", false));
        assert!(evaluate(&rules, "debug.log", false));

        let reversed = rule_set(&["!important.log", "*.log"]);
        assert!(evaluate(&reversed, "important.log", false));
    }

    #[test]
    fn test_negation_then_reignore() {
        let rules = rule_set(&["*.txt", "!keep.txt", "keep.txt"]);
        assert!(evaluate(&rules, "keep.txt", false));
    }

    #[test]
    fn test_dir_only_rules_invisible_to_files() {
        let rules = rule_set(&["cache/"]);
        assert!(evaluate(&rules, "cache", true));
        assert!(!evaluate(&rules, "cache", false));

        // A dir-only negation cannot re-include a file either.
        let rules = rule_set(&["data", "!data/"]);
        assert!(evaluate(&rules, "data", false));
        assert!(!evaluate(&rules, "data", true));
    }

    #[test]
    fn test_unmatched_path_is_kept() {
        let rules = rule_set(&["*.log"]);
        assert!(!evaluate(&rules, "src/main.rs", false));
        assert!(!evaluate(&rule_set(&[]), "anything", false));
    }

    #[test]
    fn test_is_ignored_resolves_absolute_paths() {
        let rules = rule_set(&["/build"]);
        assert!(rules.is_ignored(Path::new("/project/build"), true));
        assert!(!rules.is_ignored(Path::new("/project/src/build"), true));
        assert!(rules.is_ignored(Path::new("build"), true));
    }

    #[test]
    fn test_is_ignored_outside_base() {
        let rules = rule_set(&[]);
        assert!(rules.is_ignored(Path::new("/elsewhere/file.rs"), false));
        assert!(rules.is_ignored(Path::new("../sibling/file.rs"), false));
    }

    #[test]
    fn test_base_dir_itself_is_not_ignored() {
        let rules = rule_set(&["*"]);
        assert!(!rules.is_ignored(Path::new("/project"), true));
    }

    #[test]
    fn test_relative_slash_path() {
        let base = Path::new("/root/proj");
        assert_eq!(
            relative_slash_path(Path::new("/root/proj/a/b.rs"), base).as_deref(),
            Some("a/b.rs")
        );
        assert_eq!(relative_slash_path(base, base).as_deref(), Some(""));
        assert_eq!(relative_slash_path(Path::new("/root/other"), base), None);
    }

    #[test]
    fn test_load_reads_default_ignore_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(DEFAULT_IGNORE_FILENAME)
            .write_str("# generated\n*.tmp\n\n!keep.tmp\n")
            .unwrap();

        let rules = RuleSet::load(temp.path(), None).unwrap();
        assert_eq!(rules.len(), DEFAULT_PATTERNS.len() + 2);
        assert!(rules.is_ignored(&temp.path().join("scratch.tmp"), false));
        assert!(!rules.is_ignored(&temp.path().join("keep.tmp"), false));
    }

    #[test]
    fn test_load_prefers_override() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(DEFAULT_IGNORE_FILENAME).write_str("a.txt\n").unwrap();
        let custom = temp.child("custom.ignore");
        custom.write_str("b.txt\n").unwrap();

        let rules = RuleSet::load(temp.path(), Some(custom.path())).unwrap();
        assert!(!rules.is_ignored(&temp.path().join("a.txt"), false));
        assert!(rules.is_ignored(&temp.path().join("b.txt"), false));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = assert_fs::TempDir::new().unwrap();

        let rules = RuleSet::load(temp.path(), None).unwrap();
        assert_eq!(rules.len(), DEFAULT_PATTERNS.len());

        let missing = temp.path().join("missing.ignore");
        let rules = RuleSet::load(temp.path(), Some(&missing)).unwrap();
        assert_eq!(rules.len(), DEFAULT_PATTERNS.len());
    }

    #[test]
    fn test_load_unreadable_file_uses_defaults() {
        let temp = assert_fs::TempDir::new().unwrap();
        // A directory in place of the ignore file fails to read.
        temp.child(DEFAULT_IGNORE_FILENAME).create_dir_all().unwrap();

        let rules = RuleSet::load(temp.path(), None).unwrap();
        assert_eq!(rules.len(), DEFAULT_PATTERNS.len());
    }

    #[test]
    fn test_default_patterns_apply() {
        let rules = RuleSet::with_defaults("/project", Vec::<String>::new()).unwrap();
        assert!(rules.is_ignored(Path::new(".git"), true));
        assert!(!rules.is_ignored(Path::new(".git"), false));
        assert!(rules.is_ignored(Path::new("pkg/__pycache__"), true));
        assert!(rules.is_ignored(Path::new("pkg/mod.pyc"), false));
        assert!(rules.is_ignored(Path::new("web/node_modules"), true));
        assert!(rules.is_ignored(Path::new("assets/.DS_Store"), false));
        assert!(rules.is_ignored(Path::new(".env"), false));
        assert!(!rules.is_ignored(Path::new(".env.example"), false));
    }
}
