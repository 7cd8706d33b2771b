//! # Session Configuration
//!
//! Configuration for a single open waveform session.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, WaveformError};

/// Waveform session configuration.
///
/// Controls chunk size, cache capacity, prefetch breadth and load limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Samples per chunk, the unit of I/O and caching.
    ///
    /// Default: 262144 samples (1 MiB of payload per chunk).
    #[serde(default = "default_chunk_samples")]
    pub chunk_samples: u32,

    /// Maximum number of decoded chunks kept resident.
    ///
    /// Default: 32 chunks (32 MiB at the default chunk size).
    #[serde(default = "default_max_cached_chunks")]
    pub max_cached_chunks: usize,

    /// Chunks on each side of an exact read to warm in the background.
    ///
    /// Default: 1.
    #[serde(default = "default_auto_prefetch_neighbor_chunks")]
    pub auto_prefetch_neighbor_chunks: u32,

    /// Maximum chunk loads reading from the byte source at once.
    ///
    /// Default: 8.
    #[serde(default = "default_max_concurrent_loads")]
    pub max_concurrent_loads: usize,

    /// Upper bound on a single chunk load.
    ///
    /// Default: 30 seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_samples: default_chunk_samples(),
            max_cached_chunks: default_max_cached_chunks(),
            auto_prefetch_neighbor_chunks: default_auto_prefetch_neighbor_chunks(),
            max_concurrent_loads: default_max_concurrent_loads(),
            read_timeout: default_read_timeout(),
        }
    }
}

impl SessionConfig {
    /// Create a configuration for memory-constrained hosts.
    ///
    /// - Smaller chunks (64K samples)
    /// - 8 resident chunks (2 MiB)
    /// - No automatic prefetch
    pub fn low_memory() -> Self {
        Self {
            chunk_samples: 65536,
            max_cached_chunks: 8,
            auto_prefetch_neighbor_chunks: 0,
            max_concurrent_loads: 4,
            ..Default::default()
        }
    }

    /// Create a configuration for sources behind high-latency range requests.
    ///
    /// - Larger chunks to amortise per-request latency
    /// - Two neighbours prefetched on each side
    /// - Longer timeout
    pub fn remote() -> Self {
        Self {
            chunk_samples: 524288,
            max_cached_chunks: 24,
            auto_prefetch_neighbor_chunks: 2,
            max_concurrent_loads: 6,
            read_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_chunk_samples(mut self, chunk_samples: u32) -> Self {
        self.chunk_samples = chunk_samples;
        self
    }

    pub fn with_max_cached_chunks(mut self, max_cached_chunks: usize) -> Self {
        self.max_cached_chunks = max_cached_chunks;
        self
    }

    pub fn with_auto_prefetch(mut self, neighbor_chunks: u32) -> Self {
        self.auto_prefetch_neighbor_chunks = neighbor_chunks;
        self
    }

    pub fn with_max_concurrent_loads(mut self, max_concurrent_loads: usize) -> Self {
        self.max_concurrent_loads = max_concurrent_loads;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_samples == 0 {
            return Err(WaveformError::InvalidConfig(
                "chunk_samples must be > 0".to_string(),
            ));
        }

        if self.max_cached_chunks == 0 {
            return Err(WaveformError::InvalidConfig(
                "max_cached_chunks must be > 0".to_string(),
            ));
        }

        if self.max_concurrent_loads == 0 {
            return Err(WaveformError::InvalidConfig(
                "max_concurrent_loads must be > 0".to_string(),
            ));
        }

        if self.read_timeout.is_zero() {
            return Err(WaveformError::InvalidConfig(
                "read_timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Bytes of decoded samples the cache may hold when full.
    pub fn max_cache_bytes(&self) -> u64 {
        self.max_cached_chunks as u64 * self.chunk_samples as u64 * 4
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_chunk_samples() -> u32 {
    262_144
}

fn default_max_cached_chunks() -> usize {
    32
}

fn default_auto_prefetch_neighbor_chunks() -> u32 {
    1
}

fn default_max_concurrent_loads() -> usize {
    8
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(30)
}
