//! # projcat
//!
//! Concatenates every text file under a directory into a single document,
//! honouring gitignore-style ignore rules and leaving binary files out.
//!
//! ## Features
//!
//! - Gitignore-style patterns with negation, directory-only rules, anchored
//!   paths and last-match-wins precedence
//! - Built-in defaults for VCS metadata, caches and dependency folders
//! - Binary detection from a sample of each file
//! - Deterministic output ordering
//! - Atomic writes to the output file
//!
//! ## Quick Start
//!
//! ```no_run
//! use projcat::{Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .root_dir("./my-project")
//!     .output_file("./compiled.txt")
//!     .build()?;
//!
//! Pipeline::new(config)?.run()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **Rules**: defaults plus `.compileignore` compiled into a [`RuleSet`]
//! 2. **Scanner**: walks the tree, pruning ignored directories and skipping
//!    ignored or binary files
//! 3. **Writer**: renders file blocks and persists the result

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod file;
mod filter;
mod pipeline;
mod scanner;
mod writer;

pub mod pattern;

pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use file::{looks_binary, FileData, DEFAULT_SAMPLE_SIZE};
pub use filter::{evaluate, IgnoreRule, RuleSet, DEFAULT_IGNORE_FILENAME, DEFAULT_PATTERNS};
pub use pipeline::{CompileStats, Compilation, Pipeline};
pub use scanner::ScanStats;
pub use writer::{render, Destination, SEPARATOR_WIDTH};

/// Compiles the configured directory and writes the result.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Root directory doesn't exist or is not a directory
/// - An ignore pattern fails to compile
/// - The output cannot be written
///
/// # Examples
///
/// ```no_run
/// use projcat::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .root_dir(".")
///     .build()?;
///
/// run(config)?;
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<CompileStats> {
    Pipeline::new(config)?.run()
}

/// Compiles the configured directory and returns the text without writing it.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or an ignore pattern
/// fails to compile.
pub fn compile(config: Config) -> Result<Compilation> {
    Ok(Pipeline::new(config)?.compile())
}
