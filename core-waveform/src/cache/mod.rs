//! # Chunk Cache
//!
//! Session-scoped, bounded, recency-ordered chunk cache with in-flight load
//! de-duplication.

pub mod coordinator;
pub mod stats;

pub use coordinator::ChunkCache;
pub use stats::{CacheInfo, CacheStats};
