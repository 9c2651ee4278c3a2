use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Number of leading bytes inspected when classifying a file.
pub const DEFAULT_SAMPLE_SIZE: usize = 8192;

/// Share of non-text bytes above which a sample counts as binary.
const NON_TEXT_THRESHOLD: f64 = 0.3;

/// A file that survived filtering, with its decoded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileData {
    /// Absolute path to the file
    pub absolute_path: PathBuf,

    /// Path relative to the root directory, `/`-separated
    pub relative_path: String,

    /// File content, decoded lossily as UTF-8
    pub content: String,
}

impl FileData {
    /// Creates a new file data entry.
    #[must_use]
    pub const fn new(absolute_path: PathBuf, relative_path: String, content: String) -> Self {
        Self {
            absolute_path,
            relative_path,
            content,
        }
    }

    /// Reads the whole file at `absolute_path`.
    ///
    /// Invalid UTF-8 sequences are replaced with U+FFFD rather than failing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn read(absolute_path: PathBuf, relative_path: String) -> Result<Self> {
        let bytes = fs::read(&absolute_path).map_err(|e| Error::io(&absolute_path, e))?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Self::new(absolute_path, relative_path, content))
    }
}

/// Classifies a sample taken from the start of a file.
///
/// # Algorithm
///
/// 1. An empty sample is text
/// 2. Any null byte makes it binary
/// 3. Otherwise it is binary when more than 30% of the bytes fall outside
///    the text set (`0x20..=0xFF` plus BEL, BS, TAB, LF, FF, CR, ESC)
#[must_use]
pub fn looks_binary(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return false;
    }

    if memchr::memchr(0, sample).is_some() {
        return true;
    }

    let non_text = sample.iter().filter(|&&b| !is_text_byte(b)).count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = non_text as f64 / sample.len() as f64;

    ratio > NON_TEXT_THRESHOLD
}

/// Determines if a file is likely binary by sampling its first bytes.
///
/// A file that cannot be opened or read is treated as binary so that it is
/// left out of the output.
pub(crate) fn is_likely_binary(path: &Path, sample_size: usize) -> bool {
    match read_sample(path, sample_size) {
        Ok(sample) => looks_binary(&sample),
        Err(e) => {
            trace!("Treating unreadable file as binary: {}", e);
            true
        }
    }
}

fn read_sample(path: &Path, sample_size: usize) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut sample = Vec::with_capacity(sample_size);
    file.take(sample_size as u64)
        .read_to_end(&mut sample)
        .map_err(|e| Error::io(path, e))?;
    Ok(sample)
}

const fn is_text_byte(byte: u8) -> bool {
    matches!(byte, 7 | 8 | 9 | 10 | 12 | 13 | 27 | 0x20..=0xFF)
}
