use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe accumulator shared between pipeline workers.
///
/// Load workers add the size of every flushed chunk; the controller reads the
/// total to report throughput.
#[derive(Debug, Default)]
pub struct Counter {
    total: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.add(1);
    }

    pub fn add(&self, value: u64) {
        self.total.fetch_add(value, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
