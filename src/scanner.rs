use crate::{
    config::Config,
    file::{is_likely_binary, FileData},
    filter::{relative_slash_path, RuleSet},
};
use std::cell::Cell;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

/// Statistics collected during scanning.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    /// Files added to the output
    pub compiled_files: usize,

    /// Files matched by an ignore rule
    pub ignored_files: usize,

    /// Files classified as binary
    pub binary_files: usize,

    /// Files that could not be read
    pub unreadable_files: usize,

    /// Directories pruned without being descended into
    pub ignored_directories: usize,
}

impl ScanStats {
    /// Returns the total number of files left out of the output.
    #[must_use]
    pub const fn skipped_files(&self) -> usize {
        self.ignored_files + self.binary_files + self.unreadable_files
    }
}

/// Why a file was left out of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    Ignored,
    Binary,
    Unreadable,
}

/// Walks the root directory and collects the files that survive filtering.
pub(crate) struct Scanner<'a> {
    root_dir: PathBuf,
    rules: &'a RuleSet,
    include_binary: bool,
    sample_size: usize,
    output_file: Option<PathBuf>,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner over the rule set's base directory.
    pub(crate) fn new(config: &Config, rules: &'a RuleSet) -> Self {
        Self {
            root_dir: rules.base_dir().to_path_buf(),
            rules,
            include_binary: config.include_binary_files,
            sample_size: config.sample_size,
            output_file: config.output_file.as_deref().and_then(canonical_output_path),
        }
    }

    /// Scans the root directory in deterministic order.
    ///
    /// Files of a directory come first, sorted by name, followed by each
    /// subdirectory in name order. Ignored directories are pruned before
    /// they are entered. Per-file failures are counted and never abort the
    /// scan.
    pub(crate) fn scan(&self) -> (Vec<FileData>, ScanStats) {
        let mut files = Vec::new();
        let mut stats = ScanStats::default();
        let pruned = Cell::new(0usize);

        debug!("Starting scan of {}", self.root_dir.display());

        let walker = WalkDir::new(&self.root_dir)
            .follow_links(false)
            .sort_by(files_before_directories)
            .into_iter()
            .filter_entry(|entry| self.keep_entry(entry, &pruned));

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            match self.process_entry(&entry) {
                Ok(Some(file_data)) => {
                    debug!("Added: {}", file_data.relative_path);
                    stats.compiled_files += 1;
                    files.push(file_data);
                }
                Ok(None) => {}
                Err(Skip::Ignored) => stats.ignored_files += 1,
                Err(Skip::Binary) => stats.binary_files += 1,
                Err(Skip::Unreadable) => stats.unreadable_files += 1,
            }
        }

        stats.ignored_directories = pruned.get();

        debug!(
            "Scan complete: {} compiled, {} ignored, {} binary, {} unreadable, {} directories pruned",
            stats.compiled_files,
            stats.ignored_files,
            stats.binary_files,
            stats.unreadable_files,
            stats.ignored_directories
        );

        (files, stats)
    }

    /// Decides whether the walker should yield and descend into `entry`.
    fn keep_entry(&self, entry: &DirEntry, pruned: &Cell<usize>) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }

        if self.rules.is_ignored(entry.path(), true) {
            debug!(
                "Skipped (ignored directory): {}/",
                self.relative_path(entry.path())
            );
            pruned.set(pruned.get() + 1);
            return false;
        }

        true
    }

    /// Processes a single non-directory entry.
    ///
    /// `Ok(None)` means the entry is not a candidate at all (a link to a
    /// directory, a socket) and is not counted.
    fn process_entry(&self, entry: &DirEntry) -> Result<Option<FileData>, Skip> {
        let path = entry.path();
        let relative_path = self.relative_path(path);

        trace!("Processing file: {}", relative_path);

        // Links are matched by the file they resolve to; the header keeps
        // the link's own path.
        let file_type = entry.file_type();
        let match_path = if file_type.is_symlink() {
            match fs::metadata(path) {
                Ok(metadata) if metadata.is_dir() => {
                    trace!("Not following directory link: {}", relative_path);
                    return Ok(None);
                }
                Ok(_) => match self.resolve_link(path) {
                    Some(target) => target,
                    None => {
                        debug!("Skipped (ignored): {} (links outside root)", relative_path);
                        return Err(Skip::Ignored);
                    }
                },
                Err(e) => {
                    debug!("Error reading {}: {}", relative_path, e);
                    return Err(Skip::Unreadable);
                }
            }
        } else if file_type.is_file() {
            path.to_path_buf()
        } else {
            trace!("Not a regular file: {}", relative_path);
            return Ok(None);
        };

        if self.output_file.as_deref() == Some(match_path.as_path()) {
            debug!("Skipped (output file): {}", relative_path);
            return Err(Skip::Ignored);
        }

        if self.rules.is_ignored(&match_path, false) {
            debug!("Skipped (ignored): {}", relative_path);
            return Err(Skip::Ignored);
        }

        if !self.include_binary && is_likely_binary(path, self.sample_size) {
            debug!("Skipped (binary): {}", relative_path);
            return Err(Skip::Binary);
        }

        FileData::read(path.to_path_buf(), relative_path.clone())
            .map(Some)
            .map_err(|e| {
                debug!("Error reading {}: {}", relative_path, e);
                Skip::Unreadable
            })
    }

    /// Canonical target of a file link, if it stays inside the root.
    fn resolve_link(&self, path: &Path) -> Option<PathBuf> {
        fs::canonicalize(path)
            .ok()
            .filter(|target| target.starts_with(&self.root_dir))
    }

    fn relative_path(&self, path: &Path) -> String {
        relative_slash_path(path, &self.root_dir)
            .unwrap_or_else(|| path.to_string_lossy().into_owned())
    }
}

/// Resolves where the output file lives, even before it is first written.
fn canonical_output_path(path: &Path) -> Option<PathBuf> {
    if let Ok(existing) = fs::canonicalize(path) {
        return Some(existing);
    }
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    Some(fs::canonicalize(parent).ok()?.join(path.file_name()?))
}

/// Orders directory entries so plain files precede subdirectories.
fn files_before_directories(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn scan_with(root: &Path, extra: &[&str], include_binary: bool) -> (Vec<FileData>, ScanStats) {
        let root = root.canonicalize().unwrap();
        let config = Config::builder()
            .root_dir(&root)
            .include_binary_files(include_binary)
            .build()
            .unwrap();
        let rules = RuleSet::with_defaults(&root, extra.iter().copied()).unwrap();
        Scanner::new(&config, &rules).scan()
    }

    fn paths(files: &[FileData]) -> Vec<&str> {
        files.iter().map(|f| f.relative_path.as_str()).collect()
    }

    #[test]
    fn test_scanner_finds_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("file1.rs").write_str("fn main() {}").unwrap();
        temp.child("file2.rs").write_str("pub fn test() {}").unwrap();

        let (files, stats) = scan_with(temp.path(), &[], false);

        assert_eq!(paths(&files), vec!["file1.rs", "file2.rs"]);
        assert_eq!(files[0].content, "fn main() {}");
        assert_eq!(stats.compiled_files, 2);
        assert_eq!(stats.skipped_files(), 0);
    }

    #[test]
    fn test_scanner_orders_files_before_subdirectories() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("b/inner.rs").write_str("b").unwrap();
        temp.child("a/z.rs").write_str("az").unwrap();
        temp.child("a/deep/x.rs").write_str("adx").unwrap();
        temp.child("a/m.rs").write_str("am").unwrap();
        temp.child("z.rs").write_str("z").unwrap();
        temp.child("c.rs").write_str("c").unwrap();

        let (files, _) = scan_with(temp.path(), &[], false);

        assert_eq!(
            paths(&files),
            vec!["c.rs", "z.rs", "a/m.rs", "a/z.rs", "a/deep/x.rs", "b/inner.rs"]
        );
    }

    #[test]
    fn test_scanner_skips_binary() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("text.rs").write_str("fn main() {}").unwrap();
        temp.child("binary.exe").write_binary(&[0u8; 100]).unwrap();

        let (files, stats) = scan_with(temp.path(), &[], false);

        assert_eq!(paths(&files), vec!["text.rs"]);
        assert_eq!(stats.binary_files, 1);
        assert_eq!(stats.skipped_files(), 1);
    }

    #[test]
    fn test_scanner_includes_binary_when_enabled() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("text.rs").write_str("fn main() {}").unwrap();
        temp.child("binary.exe").write_binary(&[0u8; 100]).unwrap();

        let (files, stats) = scan_with(temp.path(), &[], true);

        assert_eq!(paths(&files), vec!["binary.exe", "text.rs"]);
        assert_eq!(stats.binary_files, 0);
    }

    #[test]
    fn test_scanner_counts_ignored_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("included.rs").write_str("fn main() {}").unwrap();
        temp.child("debug.log").write_str("trace").unwrap();
        temp.child(".env").write_str("SECRET=1").unwrap();

        let (files, stats) = scan_with(temp.path(), &["*.log"], false);

        assert_eq!(paths(&files), vec!["included.rs"]);
        assert_eq!(stats.ignored_files, 2);
    }

    #[test]
    fn test_scanner_prunes_ignored_directories() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/lib.rs").write_str("pub fn a() {}").unwrap();
        temp.child("target/debug/out.rs").write_str("x").unwrap();
        temp.child("node_modules/pkg/index.js").write_str("x").unwrap();
        temp.child(".git/HEAD").write_str("ref").unwrap();

        let (files, stats) = scan_with(temp.path(), &["target/", "!out.rs"], false);

        assert_eq!(paths(&files), vec!["src/lib.rs"]);
        assert_eq!(stats.ignored_directories, 3);
        // Pruned contents are never visited, so they are not counted either.
        assert_eq!(stats.ignored_files, 0);
    }

    #[test]
    fn test_scanner_empty_directory() {
        let temp = assert_fs::TempDir::new().unwrap();

        let (files, stats) = scan_with(temp.path(), &[], false);

        assert!(files.is_empty());
        assert_eq!(stats, ScanStats::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_scanner_does_not_follow_directory_links() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("real/file.rs").write_str("x").unwrap();
        std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("alias")).unwrap();

        let (files, _) = scan_with(temp.path(), &[], false);

        assert_eq!(paths(&files), vec!["real/file.rs"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_scanner_ignores_links_leaving_root() {
        let outside = assert_fs::TempDir::new().unwrap();
        outside.child("secret.txt").write_str("secret").unwrap();

        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("local.txt").write_str("local").unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            temp.path().join("escape.txt"),
        )
        .unwrap();
        std::os::unix::fs::symlink(temp.path().join("local.txt"), temp.path().join("inner.txt"))
            .unwrap();

        let (files, stats) = scan_with(temp.path(), &[], false);

        assert_eq!(paths(&files), vec!["inner.txt", "local.txt"]);
        assert_eq!(stats.ignored_files, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_scanner_matches_links_by_target() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".env").write_str("SECRET=hunter2").unwrap();
        temp.child("notes/draft.log").write_str("draft").unwrap();
        temp.child("readme.md").write_str("hello").unwrap();
        std::os::unix::fs::symlink(temp.path().join(".env"), temp.path().join("settings"))
            .unwrap();
        std::os::unix::fs::symlink(
            temp.path().join("notes/draft.log"),
            temp.path().join("draft.txt"),
        )
        .unwrap();
        std::os::unix::fs::symlink(temp.path().join("readme.md"), temp.path().join("about.log"))
            .unwrap();

        let (files, stats) = scan_with(temp.path(), &["*.log"], false);

        // The header keeps the link's own path.
        assert_eq!(paths(&files), vec!["about.log", "readme.md"]);
        assert_eq!(files[0].content, "hello");
        assert!(files.iter().all(|f| f.content != "SECRET=hunter2"));
        // .env, settings, draft.txt and notes/draft.log
        assert_eq!(stats.ignored_files, 4);
    }

    #[test]
    fn test_scanner_skips_its_own_output_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.rs").write_str("fn main() {}").unwrap();
        temp.child("out/compiled.txt").write_str("previous run").unwrap();

        let root = temp.path().canonicalize().unwrap();
        let config = Config::builder()
            .root_dir(&root)
            .output_file(root.join("out/compiled.txt"))
            .build()
            .unwrap();
        let rules = RuleSet::with_defaults(&root, Vec::<String>::new()).unwrap();
        let (files, stats) = Scanner::new(&config, &rules).scan();

        assert_eq!(paths(&files), vec!["main.rs"]);
        assert_eq!(stats.ignored_files, 1);
    }

    #[test]
    fn test_canonical_output_path_for_missing_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();

        assert_eq!(
            canonical_output_path(&temp.path().join("fresh.txt")),
            Some(root.join("fresh.txt"))
        );
        assert_eq!(canonical_output_path(&temp.path().join("no/such/dir.txt")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_scanner_counts_broken_links_as_unreadable() {
        let temp = assert_fs::TempDir::new().unwrap();
        std::os::unix::fs::symlink(temp.path().join("gone"), temp.path().join("dangling")).unwrap();

        let (files, stats) = scan_with(temp.path(), &[], false);

        assert!(files.is_empty());
        assert_eq!(stats.unreadable_files, 1);
    }
}
