//! # Chunk Store
//!
//! Splits the sample domain into fixed-size chunks and loads one chunk at a
//! time from the byte source. Chunks are the unit of I/O and caching.

use std::sync::Arc;
use tracing::trace;

use crate::error::{Result, WaveformError};
use crate::header::{decode_samples, WaveformHeader, BYTES_PER_SAMPLE};
use crate::source::ByteSource;

/// A decoded run of samples `[start_sample, end_sample)`.
///
/// Values are shared and immutable; a chunk handed out stays valid after the
/// cache evicts it.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: u32,
    pub start_sample: u64,
    pub end_sample: u64,
    pub values: Arc<[f32]>,
}

impl Chunk {
    pub fn empty(index: u32, at_sample: u64) -> Self {
        Self {
            index,
            start_sample: at_sample,
            end_sample: at_sample,
            values: Arc::from(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        &self.values
    }

    /// Decoded size in memory.
    pub fn byte_size(&self) -> u64 {
        self.values.len() as u64 * BYTES_PER_SAMPLE
    }
}

/// Loads chunks of a single validated file.
pub struct ChunkStore {
    source: Arc<dyn ByteSource>,
    header: WaveformHeader,
    chunk_samples: u32,
}

impl ChunkStore {
    pub fn new(source: Arc<dyn ByteSource>, header: WaveformHeader, chunk_samples: u32) -> Self {
        Self {
            source,
            header,
            chunk_samples,
        }
    }

    pub fn header(&self) -> &WaveformHeader {
        &self.header
    }

    pub fn source(&self) -> &Arc<dyn ByteSource> {
        &self.source
    }

    pub fn chunk_samples(&self) -> u32 {
        self.chunk_samples
    }

    pub fn chunk_count(&self) -> u32 {
        self.header.chunk_count(self.chunk_samples)
    }

    /// Sample span covered by `index`, clamped to the payload.
    pub fn chunk_span(&self, index: u32) -> (u64, u64) {
        let start = index as u64 * self.chunk_samples as u64;
        let end = (start + self.chunk_samples as u64).min(self.header.sample_count as u64);
        (start, end.max(start))
    }

    /// Read and decode one chunk.
    ///
    /// Indices past the end yield an empty chunk without touching the source.
    pub async fn load_chunk(&self, index: u32) -> Result<Chunk> {
        let (start_sample, end_sample) = self.chunk_span(index);
        let sample_count = end_sample - start_sample;
        if sample_count == 0 {
            return Ok(Chunk::empty(index, start_sample));
        }

        let range = self.header.sample_byte_range(start_sample, end_sample);
        let expected = sample_count * BYTES_PER_SAMPLE;

        trace!(
            chunk_index = index,
            start = range.start,
            end = range.end,
            source = %self.source.describe(),
            "Reading chunk bytes"
        );

        let bytes = self.source.read_range(range.start, range.end).await?;
        if bytes.len() as u64 != expected {
            return Err(WaveformError::integrity(
                format!("chunk {}", index),
                expected,
                bytes.len() as u64,
            ));
        }

        Ok(Chunk {
            index,
            start_sample,
            end_sample,
            values: Arc::from(decode_samples(&bytes)),
        })
    }
}
