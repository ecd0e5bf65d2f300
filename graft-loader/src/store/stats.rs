//! Store statistics and metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Thread-safe store metrics collector.
#[derive(Debug)]
pub struct StoreMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    clears: AtomicU64,
    missing_marks: AtomicU64,
    created_at: Instant,
}

impl Default for StoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            clears: AtomicU64::new(0),
            missing_marks: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    /// Record a lookup that found an entry.
    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup that found nothing.
    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a write.
    #[inline]
    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a clear operation.
    #[inline]
    pub fn record_clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an id the fetcher did not return.
    #[inline]
    pub fn record_missing(&self) {
        self.missing_marks.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of the current stats.
    pub fn snapshot(&self) -> StoreStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        StoreStats {
            hits,
            misses,
            writes: self.writes.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            missing_marks: self.missing_marks.load(Ordering::Relaxed),
            hit_rate: if hits + misses > 0 {
                hits as f64 / (hits + misses) as f64
            } else {
                0.0
            },
            uptime: self.created_at.elapsed(),
            entities: 0,    // Filled by the store
            collections: 0, // Filled by the store
            included: 0,    // Filled by the store
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.clears.store(0, Ordering::Relaxed);
        self.missing_marks.store(0, Ordering::Relaxed);
    }
}

/// A snapshot of store statistics.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Number of writes.
    pub writes: u64,
    /// Number of clear operations.
    pub clears: u64,
    /// Ids recorded as missing from fetch results.
    pub missing_marks: u64,
    /// Hit rate (0.0 - 1.0).
    pub hit_rate: f64,
    /// Time since the store was created.
    pub uptime: Duration,
    /// Number of cached entities.
    pub entities: usize,
    /// Number of cached collections.
    pub collections: usize,
    /// Number of entities marked as included.
    pub included: usize,
}

impl StoreStats {
    /// Total number of lookups.
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Format as a human-readable string.
    pub fn summary(&self) -> String {
        format!(
            "Store Stats: {} hits, {} misses ({:.1}% hit rate), {} entities, {} collections, {} included, uptime {:?}",
            self.hits,
            self.misses,
            self.hit_rate * 100.0,
            self.entities,
            self.collections,
            self.included,
            self.uptime
        )
    }
}
