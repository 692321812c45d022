//! # pagelog
//!
//! A durable, paged, append-only log: the write-ahead core for
//! log-structured storage engines.
//!
//! ## Features
//!
//! - **Crash-safe framing**: records are chopped into CRC-32C-checked
//!   fragments that never straddle a 32 KiB page boundary
//! - **Segment rotation**: the log grows as a directory of immutable,
//!   monotonically numbered segment files
//! - **Asynchronous retirement**: fsync and close of rotated segments
//!   happen off the append path, on a bounded work queue
//! - **Forward recovery**: a reader reassembles records sequentially and
//!   reports checksum, padding, and torn-tail corruption precisely
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pagelog::{Wal, WalMetrics, WalOptions, WalReader};
//!
//! let metrics = Arc::new(WalMetrics::new());
//! let options = WalOptions::new().segment_size(128 * 1024 * 1024);
//! let wal = Wal::open("./log", options, Arc::clone(&metrics))?;
//!
//! wal.log(b"payload", 0)?;
//! wal.stop()?;
//!
//! let mut reader = WalReader::open("./log".as_ref(), 0, "wal")?;
//! while reader.next() {
//!     println!("{} bytes", reader.record().len());
//! }
//! ```

// Public modules
pub mod error;
pub mod options;

// Internal modules
mod metrics;
mod util;
mod wal;

// Re-export main types for convenience
pub use error::{CorruptionKind, Error, Result};
pub use options::WalOptions;

// Writer and reader
pub use wal::{last_segment, segments, Records, Segment, SegmentRef, Wal, WalReader};

// Format constants
pub use wal::{RecordType, DEFAULT_SEGMENT_SIZE, HEADER_SIZE, MAX_FRAGMENT_SIZE, PAGE_SIZE};

// Metrics
pub use metrics::{Counter, Histogram, WalMetrics};
