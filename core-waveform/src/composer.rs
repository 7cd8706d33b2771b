//! # Range Composer
//!
//! Turns sample ranges and explicit chunk lists into flat sample buffers.
//!
//! Covering chunks are requested concurrently and placed by computed offset,
//! so output order never depends on which load finishes first.

use futures::future::{join_all, try_join_all};
use std::ops::RangeInclusive;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::cache::ChunkCache;
use crate::error::{Result, WaveformError};

pub struct RangeComposer {
    cache: ChunkCache,
    auto_prefetch: u32,
}

impl RangeComposer {
    pub fn new(cache: ChunkCache, auto_prefetch_neighbor_chunks: u32) -> Self {
        Self {
            cache,
            auto_prefetch: auto_prefetch_neighbor_chunks,
        }
    }

    fn sample_count(&self) -> u64 {
        self.cache.store().header().sample_count as u64
    }

    fn chunk_samples(&self) -> u64 {
        self.cache.store().chunk_samples() as u64
    }

    fn chunk_count(&self) -> u32 {
        self.cache.store().chunk_count()
    }

    /// Clamp `[start, end)` into the payload; inverted ranges become empty.
    pub fn clamp(&self, start: u64, end: u64) -> (u64, u64) {
        let count = self.sample_count();
        let start = start.min(count);
        let end = end.min(count).max(start);
        (start, end)
    }

    /// Chunks covering a non-empty clamped range.
    fn covering_chunks(&self, start: u64, end: u64) -> Option<RangeInclusive<u32>> {
        if start >= end {
            return None;
        }
        let chunk_samples = self.chunk_samples();
        let first = (start / chunk_samples) as u32;
        let last = ((end - 1) / chunk_samples) as u32;
        Some(first..=last)
    }

    /// Samples `[start, end)` after clamping, as one contiguous buffer.
    #[instrument(skip(self, cancel))]
    pub async fn get_exact_range(
        &self,
        start: u64,
        end: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>> {
        if cancel.is_cancelled() {
            return Err(WaveformError::Cancelled);
        }

        let (start, end) = self.clamp(start, end);
        let Some(span) = self.covering_chunks(start, end) else {
            return Ok(Vec::new());
        };

        let chunks =
            try_join_all(span.clone().map(|index| self.cache.get_or_load(index, cancel))).await?;

        let mut out = vec![0.0f32; (end - start) as usize];
        let mut filled = 0u64;

        for chunk in &chunks {
            let chunk_end = chunk.start_sample + chunk.len() as u64;
            let overlap_start = start.max(chunk.start_sample);
            let overlap_end = end.min(chunk_end);
            if overlap_end <= overlap_start {
                continue;
            }

            let src = &chunk.samples()[(overlap_start - chunk.start_sample) as usize
                ..(overlap_end - chunk.start_sample) as usize];
            let dst_offset = (overlap_start - start) as usize;
            out[dst_offset..dst_offset + src.len()].copy_from_slice(src);

            if overlap_start - start == filled {
                filled = overlap_end - start;
            }
        }

        if filled < end - start {
            warn!(
                requested = end - start,
                filled, "Chunk coverage short of requested range, returning filled prefix"
            );
            out.truncate(filled as usize);
        }

        self.spawn_neighbor_prefetch(span);

        Ok(out)
    }

    /// Concatenate the given chunks in order, dropping indices outside
    /// `[0, chunk_count)`.
    #[instrument(skip(self, indices, cancel), fields(requested = indices.len()))]
    pub async fn compose_chunks(
        &self,
        indices: &[i64],
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>> {
        if cancel.is_cancelled() {
            return Err(WaveformError::Cancelled);
        }

        let chunk_count = self.chunk_count() as i64;
        let valid: Vec<u32> = indices
            .iter()
            .copied()
            .filter(|index| (0..chunk_count).contains(index))
            .map(|index| index as u32)
            .collect();

        if valid.len() < indices.len() {
            debug!(
                dropped = indices.len() - valid.len(),
                "Ignoring out-of-range chunk indices"
            );
        }

        let chunks =
            try_join_all(valid.iter().map(|&index| self.cache.get_or_load(index, cancel))).await?;

        let total = chunks.iter().map(|chunk| chunk.len()).sum();
        let mut out = Vec::with_capacity(total);
        for chunk in &chunks {
            out.extend_from_slice(chunk.samples());
        }
        Ok(out)
    }

    /// Load every chunk covering `[start, end)` plus `neighbors` on each side.
    ///
    /// Waits for all of them and returns how many chunks were warmed. A range
    /// entirely outside the payload warms nothing.
    #[instrument(skip(self, cancel))]
    pub async fn prefetch_range(
        &self,
        start: u64,
        end: u64,
        neighbors: u32,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        if cancel.is_cancelled() {
            return Err(WaveformError::Cancelled);
        }

        let (start, end) = self.clamp(start, end);
        let Some(span) = self.covering_chunks(start, end) else {
            return Ok(0);
        };

        let expanded = self.expand(span, neighbors);
        let results = join_all(expanded.map(|index| self.cache.get_or_load(index, cancel))).await;

        let warmed = results.len();
        for result in results {
            result?;
        }
        Ok(warmed)
    }

    fn expand(&self, span: RangeInclusive<u32>, neighbors: u32) -> RangeInclusive<u32> {
        let last_chunk = self.chunk_count().saturating_sub(1);
        let first = span.start().saturating_sub(neighbors);
        let last = span.end().saturating_add(neighbors).min(last_chunk);
        first..=last
    }

    /// Warm chunks adjacent to `span` in a detached task bounded by the
    /// session token. Failures are logged only.
    fn spawn_neighbor_prefetch(&self, span: RangeInclusive<u32>) {
        if self.auto_prefetch == 0 {
            return;
        }

        let expanded = self.expand(span.clone(), self.auto_prefetch);
        let neighbors: Vec<u32> = expanded
            .filter(|index| !span.contains(index))
            .filter(|&index| self.cache.peek(index).is_none())
            .collect();
        if neighbors.is_empty() {
            return;
        }

        let cache = self.cache.clone();
        tokio::spawn(async move {
            let token = cache.session_token().clone();
            let results =
                join_all(neighbors.iter().map(|&index| cache.get_or_load(index, &token))).await;

            for (index, result) in neighbors.iter().zip(results) {
                match result {
                    Ok(_) => {}
                    Err(WaveformError::Cancelled | WaveformError::SessionClosed) => {
                        debug!(chunk_index = index, "Neighbor prefetch stopped by session close");
                    }
                    Err(e) => {
                        warn!(chunk_index = index, error = %e, "Neighbor prefetch failed");
                    }
                }
            }
        });
    }
}
