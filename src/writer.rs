use crate::{
    config::Config,
    error::{Error, Result},
    file::FileData,
};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Width of the `=` rule framing each file header.
pub const SEPARATOR_WIDTH: usize = 80;

/// Renders files into the compiled text blob.
///
/// Each file becomes a block of a separator line, `File: <path>`, another
/// separator, a blank line, the content, and a trailing blank line. Blocks
/// are joined with a single newline. No files render as an empty string.
#[must_use]
pub fn render(files: &[FileData]) -> String {
    let separator = "=".repeat(SEPARATOR_WIDTH);
    let capacity = files
        .iter()
        .map(|f| f.content.len() + f.relative_path.len() + 2 * SEPARATOR_WIDTH + 16)
        .sum();

    let mut output = String::with_capacity(capacity);
    for (index, file) in files.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }
        output.push('\n');
        output.push_str(&separator);
        output.push_str("\nFile: ");
        output.push_str(&file.relative_path);
        output.push('\n');
        output.push_str(&separator);
        output.push_str("\n\n");
        output.push_str(&file.content);
        output.push_str("\n\n");
    }

    output
}

/// Where the compiled output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Standard output, followed by a trailing newline
    Stdout,
    /// A file, replaced atomically
    File(PathBuf),
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => f.write_str("<stdout>"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Writes compiled output to its destination.
pub(crate) struct Writer {
    destination: Destination,
}

impl Writer {
    /// Creates a new writer from configuration.
    pub(crate) fn new(config: &Config) -> Self {
        let destination = config
            .output_file
            .clone()
            .map_or(Destination::Stdout, Destination::File);
        Self { destination }
    }

    /// Returns the configured destination.
    pub(crate) const fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Writes `content` to the destination.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directories cannot be created
    /// - Any write, sync, or rename fails
    pub(crate) fn write(&self, content: &str) -> Result<()> {
        match &self.destination {
            Destination::Stdout => Self::write_stdout(content),
            Destination::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
                }
                Self::write_file_atomic(path, content)?;
                debug!("Wrote {} bytes to {}", content.len(), path.display());
                Ok(())
            }
        }
    }

    fn write_stdout(content: &str) -> Result<()> {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(content.as_bytes())
            .and_then(|()| handle.write_all(b"\n"))
            .and_then(|()| handle.flush())
            .map_err(|e| Error::io("<stdout>", e))
    }

    /// Writes a file atomically.
    ///
    /// # Process
    ///
    /// 1. Writes content to a temporary sibling file
    /// 2. Syncs the temporary file to disk
    /// 3. Renames it over the target path
    fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
        let temp_path = temp_path_for(path);
        let mut temp_file = fs::File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;

        let written = temp_file
            .write_all(content.as_bytes())
            .and_then(|()| temp_file.sync_all());
        drop(temp_file);

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::io(&temp_path, e));
        }

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            Error::io(path, e)
        })
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
