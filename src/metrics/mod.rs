//! Observation primitives and the WAL metrics sink.
//!
//! The sink is injected at construction and threaded through the writer;
//! nothing here is process-global.

mod collector;
mod wal_metrics;

pub use collector::{Counter, Histogram};
pub use wal_metrics::WalMetrics;
