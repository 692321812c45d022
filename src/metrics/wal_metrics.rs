//! The WAL observation sink.

use super::collector::{Counter, Histogram};

/// Counters and histograms emitted by the write-ahead log.
///
/// Constructed by the caller and injected into [`crate::Wal::open`];
/// share the same instance across components that want a combined view.
#[derive(Debug, Default)]
pub struct WalMetrics {
    /// Incremented once per page flush, full or partial.
    pub(crate) page_flushes: Counter,
    /// Incremented once per completed (zero-padded, reset) page.
    pub(crate) page_completions: Counter,
    /// Durations of segment fsyncs.
    pub(crate) fsync_duration: Histogram,
    /// Incremented once per append that returned an error.
    pub(crate) writes_failed: Counter,
}

impl WalMetrics {
    /// Create a new, zeroed sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of page flushes.
    pub fn page_flushes(&self) -> u64 {
        self.page_flushes.get()
    }

    /// Total number of completed pages.
    pub fn completed_pages(&self) -> u64 {
        self.page_completions.get()
    }

    /// The fsync duration histogram.
    pub fn fsync_duration(&self) -> &Histogram {
        &self.fsync_duration
    }

    /// Total number of failed appends.
    pub fn writes_failed(&self) -> u64 {
        self.writes_failed.get()
    }

    /// Render all series in the Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("page_flushes_total {}\n", self.page_flushes()));
        output.push_str(&format!("completed_pages_total {}\n", self.completed_pages()));
        output.push_str(&self.fsync_duration.to_prometheus("fsync_duration_seconds"));
        output.push_str(&format!("writes_failed_total {}\n", self.writes_failed()));
        output
    }
}
