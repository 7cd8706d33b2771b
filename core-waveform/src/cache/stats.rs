//! Cache statistics and monitoring

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of a session's cache, for a stats panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    /// Chunks currently resident
    pub cached_chunks: usize,

    /// Chunk loads currently in flight
    pub in_flight_chunks: usize,

    /// Configured resident chunk limit
    pub max_cached_chunks: usize,

    /// Samples per chunk
    pub chunk_samples: u32,

    /// Chunks needed to cover the file
    pub chunk_count: u32,

    pub sample_count: u32,

    pub sample_rate_hz: u32,
}

/// Cumulative cache counters since the session opened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Requests answered from a resident chunk
    pub hits: u64,

    /// Requests that started a new load
    pub misses: u64,

    /// Requests that joined a load already in flight
    pub joins: u64,

    /// Loads that finished successfully
    pub completed_loads: u64,

    /// Loads that failed (the error went to every waiter)
    pub failed_loads: u64,

    /// Loads aborted because no one was waiting or the session closed
    pub cancelled_loads: u64,

    /// Chunks dropped to respect the resident limit
    pub evictions: u64,

    /// Decoded bytes currently resident
    pub resident_bytes: u64,
}

impl CacheStats {
    /// Total chunk requests seen.
    pub fn requests(&self) -> u64 {
        self.hits + self.misses + self.joins
    }

    /// Fraction of requests served without starting a new load (0.0-1.0).
    ///
    /// Joining an in-flight load counts as a hit: it issued no extra I/O.
    pub fn hit_rate(&self) -> f64 {
        let requests = self.requests();
        if requests == 0 {
            return 0.0;
        }

        (self.hits + self.joins) as f64 / requests as f64
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub joins: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,
    pub evictions: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, resident_bytes: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            joins: self.joins.load(Ordering::Relaxed),
            completed_loads: self.completed.load(Ordering::Relaxed),
            failed_loads: self.failed.load(Ordering::Relaxed),
            cancelled_loads: self.cancelled.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            resident_bytes,
        }
    }
}
