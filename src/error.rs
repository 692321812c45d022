//! Error types for pagelog.

use std::io;
use thiserror::Error;

/// Result type alias for pagelog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for log operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Segment size is not a non-zero multiple of the page size.
    #[error("invalid segment size {size}: must be a non-zero multiple of the 32 KiB page size")]
    InvalidSegmentSize { size: usize },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Append attempted after the log was stopped.
    #[error("wal is closed")]
    WalClosed,

    /// Stop attempted on an already stopped log.
    #[error("wal is already closed")]
    WalAlreadyClosed,

    /// I/O error from file operations.
    #[error("I/O error: {0}")]
    Io(String),

    /// Data corruption detected while reading a segment.
    ///
    /// `segment` is the index of the segment being read when known;
    /// `offset` is the number of bytes consumed when the corruption
    /// was encountered.
    #[error("corruption detected: {kind} (offset {offset})")]
    Corruption {
        segment: Option<u64>,
        offset: u64,
        kind: CorruptionKind,
    },

    /// Directory listing contains files that are not segments.
    #[error("segment enumeration failed: {0}")]
    Enumeration(String),
}

/// The specific form of corruption a reader encountered.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionKind {
    /// Fragment payload does not match its stored checksum.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    BadCrc { expected: u32, actual: u32 },

    /// Non-zero byte found in the zero padding of a terminated page.
    #[error("unexpected non-zero byte in padded page")]
    TornPage,

    /// Fragment length field exceeds what fits in a page.
    #[error("invalid record size {length}")]
    InvalidRecordSize { length: usize },

    /// Fragment type is invalid given the reassembly state.
    #[error("unexpected fragment type {typ}")]
    BadSequence { typ: u8 },

    /// End of file reached in the middle of a record.
    #[error("last record is torn")]
    TornTail,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create an enumeration error with the given message.
    pub fn enumeration<S: Into<String>>(msg: S) -> Self {
        Error::Enumeration(msg.into())
    }

    /// Check if this error indicates on-disk corruption.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption { .. })
    }

    /// The corruption kind, if this is a corruption error.
    pub fn corruption_kind(&self) -> Option<CorruptionKind> {
        match self {
            Error::Corruption { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidSegmentSize { size: 33000 };
        assert_eq!(
            format!("{}", err),
            "invalid segment size 33000: must be a non-zero multiple of the 32 KiB page size"
        );

        let err = Error::Corruption {
            segment: Some(3),
            offset: 128,
            kind: CorruptionKind::TornPage,
        };
        assert_eq!(
            format!("{}", err),
            "corruption detected: unexpected non-zero byte in padded page (offset 128)"
        );
    }

    #[test]
    fn test_is_corruption() {
        let err = Error::Corruption {
            segment: None,
            offset: 0,
            kind: CorruptionKind::TornTail,
        };
        assert!(err.is_corruption());
        assert_eq!(err.corruption_kind(), Some(CorruptionKind::TornTail));

        assert!(!Error::WalClosed.is_corruption());
        assert_eq!(Error::WalClosed.corruption_kind(), None);
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
