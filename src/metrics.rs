//! Latency histogram for the per-event pipeline (spec.md §4.2 step 15).
//!
//! Grounded on `tests/benchmark_logging.cpp`'s latency-sampling intent; the
//! pack carries no metrics crate, so this is a small fixed-bucket histogram
//! rather than a fabricated dependency. Samples are only ever surfaced via
//! `log::trace!` -- there is no exporter, matching spec.md §1's
//! "deliberately out of scope" stance on an observability backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Upper bound (in microseconds) of each bucket. The last bucket catches
/// everything above `BUCKET_BOUNDS_US`'s final entry.
const BUCKET_BOUNDS_US: [u64; 8] = [50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000];

/// A fixed-bucket latency histogram, safe to update from the single
/// pipeline consumer thread without a lock.
pub struct LatencyHistogram {
    buckets: [AtomicU64; BUCKET_BOUNDS_US.len() + 1],
    count: AtomicU64,
    sum_us: AtomicU64,
}

impl LatencyHistogram {
    pub const fn new() -> Self {
        const ZERO: AtomicU64 = AtomicU64::new(0);
        LatencyHistogram {
            buckets: [ZERO; BUCKET_BOUNDS_US.len() + 1],
            count: AtomicU64::new(0),
            sum_us: AtomicU64::new(0),
        }
    }

    pub fn record(&self, elapsed: Duration) {
        let us = elapsed.as_micros() as u64;
        let bucket = BUCKET_BOUNDS_US
            .iter()
            .position(|bound| us <= *bound)
            .unwrap_or(BUCKET_BOUNDS_US.len());
        self.buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(us, Ordering::Relaxed);
        log::trace!("metrics: key_processing took {us}us (bucket {bucket})");
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean_us(&self) -> f64 {
        let n = self.count();
        if n == 0 {
            0.0
        } else {
            self.sum_us.load(Ordering::Relaxed) as f64 / n as f64
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

static KEY_PROCESSING: LatencyHistogram = LatencyHistogram::new();

/// Records one sample of the full per-event pipeline duration (§4.2 step 15).
pub fn record_key_processing_latency(elapsed: Duration) {
    KEY_PROCESSING.record(elapsed);
}

pub fn key_processing_histogram() -> &'static LatencyHistogram {
    &KEY_PROCESSING
}
