//! Atomic metric primitives.
//!
//! Counter and Histogram are lock-free and safe to update from the writer
//! and the background worker concurrently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter initialized to 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter by 1.
    pub fn inc(&self) {
        self.add(1);
    }

    /// Add a value to the counter.
    pub fn add(&self, v: u64) {
        self.value.fetch_add(v, Ordering::Relaxed);
    }

    /// Get the current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A histogram of durations, bucketed by latency range.
///
/// Observations are recorded in microseconds. Bucket boundaries cover
/// the range from sub-microsecond up to multi-second fsync stalls.
#[derive(Debug)]
pub struct Histogram {
    count: AtomicU64,
    /// Sum of all observations, in microseconds.
    sum: AtomicU64,
    /// Cumulative-style bucket counts; the last bucket is the overflow.
    buckets: [AtomicU64; 9],
}

impl Histogram {
    /// Upper bucket bounds in microseconds.
    const BUCKET_BOUNDS: [u64; 8] = [
        1,          // <1us
        10,         // <10us
        100,        // <100us
        1_000,      // <1ms
        10_000,     // <10ms
        100_000,    // <100ms
        1_000_000,  // <1s
        10_000_000, // <10s
    ];

    /// Create a new histogram.
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            buckets: Default::default(),
        }
    }

    /// Record the time elapsed since `start`.
    pub fn observe_duration(&self, start: Instant) {
        self.observe(start.elapsed().as_micros() as u64);
    }

    /// Record a value in microseconds.
    pub fn observe(&self, micros: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(micros, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| micros < bound)
            .unwrap_or(8);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    /// Number of observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum of all observations, in microseconds.
    pub fn sum_micros(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    /// Mean observation in microseconds.
    pub fn mean_micros(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum_micros() as f64 / count as f64
        }
    }

    /// Per-bucket observation counts.
    pub fn bucket_counts(&self) -> [u64; 9] {
        let mut counts = [0u64; 9];
        for (i, bucket) in self.buckets.iter().enumerate() {
            counts[i] = bucket.load(Ordering::Relaxed);
        }
        counts
    }

    /// Render as a Prometheus histogram with second-denominated buckets.
    pub fn to_prometheus(&self, name: &str) -> String {
        let mut output = String::new();
        let buckets = self.bucket_counts();
        let mut cumulative = 0u64;

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            cumulative += buckets[i];
            output.push_str(&format!(
                "{}_bucket{{le=\"{}\"}} {}\n",
                name,
                bound as f64 / 1_000_000.0,
                cumulative
            ));
        }

        cumulative += buckets[8];
        output.push_str(&format!("{}_bucket{{le=\"+Inf\"}} {}\n", name, cumulative));
        output.push_str(&format!(
            "{}_sum {}\n",
            name,
            self.sum_micros() as f64 / 1_000_000.0
        ));
        output.push_str(&format!("{}_count {}\n", name, self.count()));

        output
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}
