//! # Core Waveform Module
//!
//! Out-of-core access to very large sampled waveform files.
//!
//! ## Overview
//!
//! A waveform file is a 20-byte header followed by little-endian `f32`
//! samples. This crate reads such files through an abstract random-access
//! [`ByteSource`] (local file, HTTP range requests, or memory) without ever
//! materialising them:
//!
//! - **Header codec** ([`header`]) - parse, validate and encode the header
//! - **Chunk store** ([`chunk`]) - fixed-size chunks, the unit of I/O
//! - **Chunk cache** ([`cache`]) - bounded LRU with in-flight de-duplication
//! - **Range composer** ([`composer`]) - sample ranges and chunk lists as flat
//!   buffers, with neighbour prefetch
//! - **Engine** ([`engine`]) - open/read/prefetch/close session facade
//! - **Preview** ([`preview`]) - strided min/max overview for whole-file views
//!
//! Memory stays bounded by `max_cached_chunks * chunk_samples * 4` bytes of
//! decoded samples regardless of file size.
//!
//! ## Concurrency
//!
//! Any number of reads may run against one session. Concurrent requests for
//! the same missing chunk share one source read. Every read takes a
//! [`CancellationToken`](tokio_util::sync::CancellationToken); cancelling one
//! caller never cancels a load other callers are still waiting on.

pub mod cache;
pub mod chunk;
pub mod composer;
pub mod config;
pub mod engine;
pub mod error;
pub mod header;
pub mod preview;
pub mod source;

pub use cache::{CacheInfo, CacheStats, ChunkCache};
pub use chunk::{Chunk, ChunkStore};
pub use composer::RangeComposer;
pub use config::SessionConfig;
pub use engine::WaveformEngine;
pub use error::{FormatError, Result, WaveformError};
pub use header::{encode_header, encode_waveform, parse_header, WaveformHeader, HEADER_SIZE};
pub use preview::{build_preview, Preview, PreviewPoint};
pub use source::{
    ByteSource, FileSource, HttpRangeSource, MemorySource, SourceKind, SourceLocation,
};
