//! Configuration options for pagelog.

use crate::wal::{DEFAULT_SEGMENT_SIZE, PAGE_SIZE};
use crate::{Error, Result};

/// Default segment file extension.
pub const DEFAULT_EXTENSION: &str = "wal";

/// Write-ahead log configuration.
#[derive(Debug, Clone)]
pub struct WalOptions {
    /// Target segment file size in bytes. Must be a non-zero multiple
    /// of the 32 KiB page size.
    pub segment_size: usize,

    /// File extension for segment files (without the dot).
    pub extension: String,
}

impl Default for WalOptions {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl WalOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the segment size.
    pub fn segment_size(mut self, size: usize) -> Self {
        self.segment_size = size;
        self
    }

    /// Set the segment file extension.
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Validate the options.
    pub fn validate(&self) -> Result<()> {
        if self.segment_size == 0 || self.segment_size % PAGE_SIZE != 0 {
            return Err(Error::InvalidSegmentSize {
                size: self.segment_size,
            });
        }

        if self.extension.is_empty() {
            return Err(Error::InvalidConfiguration(
                "segment extension must not be empty".into(),
            ));
        }

        if self.extension.contains(['.', '/', '\\']) {
            return Err(Error::InvalidConfiguration(format!(
                "segment extension {:?} must not contain '.' or path separators",
                self.extension
            )));
        }

        Ok(())
    }
}
