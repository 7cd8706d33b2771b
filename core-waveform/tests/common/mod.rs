//! Shared fixtures for core-waveform integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use core_waveform::header::HEADER_SIZE;
use core_waveform::{
    encode_waveform, parse_header, ByteSource, ChunkCache, ChunkStore, Result, SessionConfig,
    SourceKind, WaveformError, WaveformHeader,
};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Synthetic waveform file with a known sample function.
pub struct TestFile {
    pub sample_rate_hz: u32,
    pub samples: Vec<f32>,
    pub bytes: Bytes,
}

impl TestFile {
    /// `sample_count` samples where sample `i` is a deterministic, non-repeating value.
    pub fn new(sample_rate_hz: u32, sample_count: usize) -> Self {
        let samples: Vec<f32> = (0..sample_count)
            .map(|i| ((i as f32) * 0.001).sin() + (i % 7) as f32)
            .collect();
        let bytes = encode_waveform(sample_rate_hz, &samples).unwrap();
        Self {
            sample_rate_hz,
            samples,
            bytes,
        }
    }

    pub fn header(&self) -> WaveformHeader {
        parse_header(&self.bytes, self.bytes.len() as u64).unwrap()
    }

    /// Reference values read straight from the encoded payload.
    pub fn oracle(&self, start: usize, end: usize) -> Vec<f32> {
        self.bytes[HEADER_SIZE + start * 4..HEADER_SIZE + end * 4]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }
}

/// In-memory source that counts reads and can delay, hold or fail them.
pub struct InstrumentedSource {
    data: Bytes,
    pub reads: AtomicUsize,
    pub active: AtomicUsize,
    pub peak_active: AtomicUsize,
    pub closed: AtomicBool,
    fail_next: AtomicUsize,
    delay_ms: AtomicU64,
    /// Delay that grows as the offset falls, so later chunks finish first.
    reverse_delay: AtomicBool,
    gate: Option<Semaphore>,
}

impl InstrumentedSource {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            reads: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            fail_next: AtomicUsize::new(0),
            delay_ms: AtomicU64::new(0),
            reverse_delay: AtomicBool::new(false),
            gate: None,
        }
    }

    /// Reads of payload bytes block until [`release`](Self::release) is called.
    /// Header reads (offset 0) pass through so sessions can still open.
    pub fn gated(data: Bytes) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(data)
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn fail_next_reads(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn finish_in_reverse_order(&self) {
        self.reverse_delay.store(true, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Poll until `count` reads have started.
    pub async fn wait_for_reads(&self, count: usize) {
        for _ in 0..500 {
            if self.read_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("expected {} reads, saw {}", count, self.read_count());
    }
}

#[async_trait]
impl ByteSource for InstrumentedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Memory
    }

    fn describe(&self) -> String {
        "instrumented".to_string()
    }

    async fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Bytes> {
        let is_header = start == 0 && end <= HEADER_SIZE as u64;
        if !is_header {
            self.reads.fetch_add(1, Ordering::SeqCst);
        }

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(active, Ordering::SeqCst);
        let _active = ActiveGuard(&self.active);

        if !is_header {
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.map_err(|_| WaveformError::Cancelled)?;
            }

            let mut delay = self.delay_ms.load(Ordering::SeqCst);
            if self.reverse_delay.load(Ordering::SeqCst) {
                delay += (self.data.len() as u64 - start) / 64;
            }
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let failed = self
                .fail_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(WaveformError::SourceUnavailable("injected failure".into()));
            }
        }

        Ok(self.data.slice(start as usize..end as usize))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cache over an instrumented source, bypassing the engine.
pub fn cache_over(
    source: Arc<InstrumentedSource>,
    header: WaveformHeader,
    config: &SessionConfig,
) -> ChunkCache {
    let store = Arc::new(ChunkStore::new(source, header, config.chunk_samples));
    ChunkCache::new(store, config)
}
