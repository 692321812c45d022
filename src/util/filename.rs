//! Segment file naming conventions.
//!
//! Segment files are named `NNNNNNNNNNNNNNNNNNNN.EXT` where `N` is the
//! 20-digit zero-padded decimal segment index and `EXT` is the extension
//! configured on the log.

use std::path::{Path, PathBuf};

/// Number of decimal digits in a segment file name's index.
pub const INDEX_DIGITS: usize = 20;

/// Generate a segment file name for the given index and extension.
pub fn segment_file_name(index: u64, extension: &str) -> String {
    format!("{:020}.{}", index, extension)
}

/// Generate the full path of a segment file.
pub fn segment_file_path(dir: &Path, index: u64, extension: &str) -> PathBuf {
    dir.join(segment_file_name(index, extension))
}

/// Parse a segment file name into its index and extension.
///
/// Returns `None` if the name is not a 20-digit zero-padded index
/// followed by a dot and a non-empty extension.
pub fn parse_segment_file_name(name: &str) -> Option<(u64, String)> {
    let (stem, extension) = name.rsplit_once('.')?;

    if stem.len() != INDEX_DIGITS || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if extension.is_empty() {
        return None;
    }

    let index = stem.parse::<u64>().ok()?;
    Some((index, extension.to_string()))
}

/// Create a directory if it doesn't exist.
pub fn create_dir_if_missing(path: &Path) -> std::io::Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}
