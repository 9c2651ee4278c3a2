use crate::{
    config::Config,
    error::{Error, Result},
    filter::RuleSet,
    scanner::{ScanStats, Scanner},
    writer::{render, Destination, Writer},
};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Statistics collected during one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileStats {
    /// Number of files added to the output
    pub files_compiled: usize,

    /// Number of files left out, for any reason
    pub files_skipped: usize,

    /// Files left out by an ignore rule
    pub ignored_files: usize,

    /// Files left out as binary
    pub binary_files: usize,

    /// Files left out because they could not be read
    pub unreadable_files: usize,

    /// Directories pruned without being visited
    pub ignored_directories: usize,

    /// Size of the compiled output in characters
    pub total_chars: usize,

    /// Time spent scanning and rendering
    pub duration: Duration,
}

impl CompileStats {
    fn new(scan: ScanStats, output: &str, duration: Duration) -> Self {
        Self {
            files_compiled: scan.compiled_files,
            files_skipped: scan.skipped_files(),
            ignored_files: scan.ignored_files,
            binary_files: scan.binary_files,
            unreadable_files: scan.unreadable_files,
            ignored_directories: scan.ignored_directories,
            total_chars: output.chars().count(),
            duration,
        }
    }
}

/// The compiled text of a directory, before it is written anywhere.
#[derive(Debug, Clone)]
pub struct Compilation {
    /// Concatenated file blocks
    pub output: String,

    /// What went into the output and what was left out
    pub stats: CompileStats,
}

/// Orchestrates rule loading, scanning, rendering and writing.
pub struct Pipeline {
    config: Config,
    rules: RuleSet,
    writer: Writer,
}

impl Pipeline {
    /// Creates a new pipeline with the given configuration.
    ///
    /// The root directory is canonicalized and the ignore rules are loaded
    /// here, so an invalid target fails before anything is scanned.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The root directory cannot be canonicalized
    /// - An ignore pattern fails to compile
    pub fn new(mut config: Config) -> Result<Self> {
        config.validate()?;

        config.root_dir = config
            .root_dir
            .canonicalize()
            .map_err(|e| Error::io(&config.root_dir, e))?;

        let rules = RuleSet::load(&config.root_dir, config.ignore_file.as_deref())?;
        debug!("Loaded {} ignore rules", rules.len());

        let writer = Writer::new(&config);

        Ok(Self {
            config,
            rules,
            writer,
        })
    }

    /// Returns the loaded ignore rules.
    #[must_use]
    pub const fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Returns where [`Pipeline::run`] writes its output.
    #[must_use]
    pub const fn destination(&self) -> &Destination {
        self.writer.destination()
    }

    /// Scans and renders the directory without writing the result.
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub fn compile(&self) -> Compilation {
        let start = Instant::now();

        let (files, scan_stats) = Scanner::new(&self.config, &self.rules).scan();
        let output = render(&files);
        let stats = CompileStats::new(scan_stats, &output, start.elapsed());

        Compilation { output, stats }
    }

    /// Compiles the directory and writes the output to its destination.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use projcat::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .root_dir("./src")
    ///     .output_file("./out/compiled.txt")
    ///     .build()?;
    ///
    /// let stats = Pipeline::new(config)?.run()?;
    /// println!("{} files compiled", stats.files_compiled);
    /// # Ok(())
    /// # }
    /// ```
    pub fn run(self) -> Result<CompileStats> {
        let Compilation { output, stats } = self.compile();

        info!("Summary:");
        info!("  Files compiled: {}", stats.files_compiled);
        info!("  Files skipped: {}", stats.files_skipped);
        info!("  Total size: {} characters", stats.total_chars);
        info!("  Elapsed: {:.2}s", stats.duration.as_secs_f64());

        self.writer.write(&output)?;

        if let Destination::File(path) = self.writer.destination() {
            info!("Output written to: {}", path.display());
        }

        Ok(stats)
    }
}
