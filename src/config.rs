use crate::error::{Error, Result};
use crate::file::DEFAULT_SAMPLE_SIZE;
use std::path::PathBuf;

/// Configuration for a projcat run.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Directory whose files are concatenated
    pub root_dir: PathBuf,

    /// Output file; `None` writes to stdout
    pub output_file: Option<PathBuf>,

    /// Ignore file overriding `<root_dir>/.compileignore`
    pub ignore_file: Option<PathBuf>,

    /// Include files classified as binary
    pub include_binary_files: bool,

    /// Bytes sampled from the start of each file for binary detection
    pub sample_size: usize,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use projcat::Config;
    ///
    /// let config = Config::builder()
    ///     .root_dir(".")
    ///     .include_binary_files(true)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Root directory doesn't exist or is not a directory
    /// - Sample size is zero
    /// - Output path points at an existing directory
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.exists() {
            return Err(Error::config(format!(
                "Directory does not exist: {}",
                self.root_dir.display()
            )));
        }

        if !self.root_dir.is_dir() {
            return Err(Error::config(format!(
                "Path is not a directory: {}",
                self.root_dir.display()
            )));
        }

        if self.sample_size == 0 {
            return Err(Error::config("sample_size must be greater than 0"));
        }

        if let Some(ref output) = self.output_file {
            if output.is_dir() {
                return Err(Error::config(format!(
                    "Output path is a directory: {}",
                    output.display()
                )));
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            output_file: None,
            ignore_file: None,
            include_binary_files: false,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    output_file: Option<PathBuf>,
    ignore_file: Option<PathBuf>,
    include_binary_files: bool,
    sample_size: Option<usize>,
}

impl ConfigBuilder {
    /// Sets the directory to concatenate.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the output file. Without one, output goes to stdout.
    #[must_use]
    pub fn output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    /// Sets a custom ignore file.
    #[must_use]
    pub fn ignore_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ignore_file = Some(path.into());
        self
    }

    /// Enables or disables binary file inclusion.
    #[must_use]
    pub fn include_binary_files(mut self, enabled: bool) -> Self {
        self.include_binary_files = enabled;
        self
    }

    /// Sets how many leading bytes are sampled for binary detection.
    #[must_use]
    pub fn sample_size(mut self, bytes: usize) -> Self {
        self.sample_size = Some(bytes);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            root_dir: self.root_dir.unwrap_or_else(|| PathBuf::from(".")),
            output_file: self.output_file,
            ignore_file: self.ignore_file,
            include_binary_files: self.include_binary_files,
            sample_size: self.sample_size.unwrap_or(DEFAULT_SAMPLE_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}
