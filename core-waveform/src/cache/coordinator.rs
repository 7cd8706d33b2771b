//! # Chunk Cache & In-Flight Coordinator
//!
//! Bounded LRU of decoded chunks plus a table of loads in progress.
//!
//! ## Overview
//!
//! [`ChunkCache::get_or_load`] resolves a chunk index in one of three ways,
//! decided atomically under the state lock:
//!
//! 1. **Hit** - the chunk is resident; it is touched and returned.
//! 2. **Join** - a load for the index is in flight; the caller awaits the same
//!    shared result. `k` concurrent callers cause exactly one source read.
//! 3. **Miss** - a load task is spawned and registered as in flight.
//!
//! A finished load removes its in-flight entry whether it succeeded or not,
//! inserts successful chunks as most-recent and evicts from the cold end
//! while over the limit. Failures reach every waiter and are never cached.
//!
//! ## Cancellation
//!
//! Each waiter holds a [`LoadWaiter`]. A waiter whose token fires returns
//! `Cancelled` on its own; the load keeps running for the others. When the
//! last waiter goes away the load's token is cancelled and its entry removed,
//! so an abandoned read stops touching the source. Closing the session cancels
//! the parent token of every load.

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use super::stats::{CacheInfo, CacheStats, Counters};
use crate::chunk::{Chunk, ChunkStore};
use crate::config::SessionConfig;
use crate::error::{Result, WaveformError};

type SharedLoad = Shared<BoxFuture<'static, Result<Arc<Chunk>>>>;

struct InFlightLoad {
    id: u64,
    shared: SharedLoad,
    waiters: usize,
    token: CancellationToken,
}

struct CacheState {
    resident: LruCache<u32, Arc<Chunk>>,
    resident_bytes: u64,
    in_flight: HashMap<u32, InFlightLoad>,
    closed: bool,
}

impl CacheState {
    /// Insert as most-recent, then evict least-recent entries over `max`.
    fn insert(&mut self, chunk: Arc<Chunk>, max: usize, counters: &Counters) {
        let index = chunk.index;
        self.resident_bytes += chunk.byte_size();
        if let Some(replaced) = self.resident.put(index, chunk) {
            self.resident_bytes -= replaced.byte_size();
        }

        while self.resident.len() > max {
            match self.resident.pop_lru() {
                Some((evicted, chunk)) => {
                    self.resident_bytes -= chunk.byte_size();
                    Counters::bump(&counters.evictions);
                    trace!(chunk_index = evicted, "Evicted chunk");
                }
                None => break,
            }
        }
    }
}

struct CacheInner {
    store: Arc<ChunkStore>,
    state: Mutex<CacheState>,
    limiter: Semaphore,
    counters: Counters,
    session: CancellationToken,
    max_cached_chunks: usize,
    read_timeout: Duration,
    next_load_id: AtomicU64,
}

/// Session-scoped chunk cache.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct ChunkCache {
    inner: Arc<CacheInner>,
}

impl ChunkCache {
    pub fn new(store: Arc<ChunkStore>, config: &SessionConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                store,
                state: Mutex::new(CacheState {
                    resident: LruCache::unbounded(),
                    resident_bytes: 0,
                    in_flight: HashMap::new(),
                    closed: false,
                }),
                limiter: Semaphore::new(config.max_concurrent_loads),
                counters: Counters::default(),
                session: CancellationToken::new(),
                max_cached_chunks: config.max_cached_chunks,
                read_timeout: config.read_timeout,
                next_load_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.inner.store
    }

    /// Token cancelled when the session closes.
    pub fn session_token(&self) -> &CancellationToken {
        &self.inner.session
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Return chunk `index`, loading it at most once across concurrent callers.
    #[instrument(level = "trace", skip(self, cancel))]
    pub async fn get_or_load(&self, index: u32, cancel: &CancellationToken) -> Result<Arc<Chunk>> {
        if cancel.is_cancelled() {
            return Err(WaveformError::Cancelled);
        }

        let waiter = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(WaveformError::SessionClosed);
            }

            if let Some(chunk) = state.resident.get(&index) {
                Counters::bump(&self.inner.counters.hits);
                return Ok(Arc::clone(chunk));
            }

            let (id, shared) = match state.in_flight.get_mut(&index) {
                Some(load) => {
                    Counters::bump(&self.inner.counters.joins);
                    load.waiters += 1;
                    trace!(chunk_index = index, waiters = load.waiters, "Joining in-flight load");
                    (load.id, load.shared.clone())
                }
                None => {
                    Counters::bump(&self.inner.counters.misses);
                    let load = self.inner.spawn_load(index);
                    let handle = (load.id, load.shared.clone());
                    state.in_flight.insert(index, load);
                    handle
                }
            };

            LoadWaiter {
                inner: Arc::clone(&self.inner),
                index,
                id,
                shared,
            }
        };

        waiter.wait(cancel).await
    }

    /// Resident chunk without touching recency.
    pub fn peek(&self, index: u32) -> Option<Arc<Chunk>> {
        self.inner.state.lock().resident.peek(&index).cloned()
    }

    /// Resident chunk indices, most recently used first.
    pub fn resident_indices(&self) -> Vec<u32> {
        self.inner
            .state
            .lock()
            .resident
            .iter()
            .map(|(index, _)| *index)
            .collect()
    }

    pub fn info(&self) -> CacheInfo {
        let state = self.inner.state.lock();
        let store = &self.inner.store;
        CacheInfo {
            cached_chunks: state.resident.len(),
            in_flight_chunks: state.in_flight.len(),
            max_cached_chunks: self.inner.max_cached_chunks,
            chunk_samples: store.chunk_samples(),
            chunk_count: store.chunk_count(),
            sample_count: store.header().sample_count,
            sample_rate_hz: store.header().sample_rate_hz,
        }
    }

    pub fn stats(&self) -> CacheStats {
        let resident_bytes = self.inner.state.lock().resident_bytes;
        self.inner.counters.snapshot(resident_bytes)
    }

    /// Drop all resident chunks. Loads in flight still land when they finish.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        let dropped = state.resident.len();
        state.resident.clear();
        state.resident_bytes = 0;
        debug!(dropped, "Cleared chunk cache");
    }

    /// Cancel every load, drop all state and refuse further requests.
    ///
    /// Idempotent.
    pub fn close(&self) {
        let aborted = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.resident.clear();
            state.resident_bytes = 0;
            state.in_flight.drain().count()
        };

        self.inner.session.cancel();
        debug!(aborted_loads = aborted, "Chunk cache closed");
    }
}

impl CacheInner {
    /// Spawn the load task for `index`. Caller holds the state lock and
    /// registers the returned entry.
    fn spawn_load(self: &Arc<Self>, index: u32) -> InFlightLoad {
        let id = self.next_load_id.fetch_add(1, Ordering::Relaxed);
        let token = self.session.child_token();

        let task = tokio::spawn(Arc::clone(self).run_load(index, id, token.clone()));

        let shared = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(WaveformError::Internal(format!(
                    "chunk load task failed: {}",
                    e
                ))),
            }
        }
        .boxed()
        .shared();

        InFlightLoad {
            id,
            shared,
            waiters: 1,
            token,
        }
    }

    async fn run_load(
        self: Arc<Self>,
        index: u32,
        id: u64,
        token: CancellationToken,
    ) -> Result<Arc<Chunk>> {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(WaveformError::Cancelled),
            loaded = self.load_limited(index) => loaded.map(Arc::new),
        };

        let mut state = self.state.lock();
        if state.in_flight.get(&index).map(|load| load.id) == Some(id) {
            state.in_flight.remove(&index);
        }

        match &result {
            Ok(chunk) => {
                Counters::bump(&self.counters.completed);
                if state.closed {
                    trace!(chunk_index = index, "Session closed, discarding loaded chunk");
                } else {
                    state.insert(Arc::clone(chunk), self.max_cached_chunks, &self.counters);
                }
            }
            Err(WaveformError::Cancelled) => {
                Counters::bump(&self.counters.cancelled);
                trace!(chunk_index = index, "Chunk load cancelled");
            }
            Err(e) => {
                Counters::bump(&self.counters.failed);
                warn!(chunk_index = index, error = %e, "Chunk load failed");
            }
        }

        result
    }

    async fn load_limited(&self, index: u32) -> Result<Chunk> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| WaveformError::SessionClosed)?;

        match tokio::time::timeout(self.read_timeout, self.store.load_chunk(index)).await {
            Ok(loaded) => loaded,
            Err(_) => Err(WaveformError::SourceUnavailable(format!(
                "chunk {} load timed out after {:?}",
                index, self.read_timeout
            ))),
        }
    }
}

/// One caller's interest in an in-flight load.
struct LoadWaiter {
    inner: Arc<CacheInner>,
    index: u32,
    id: u64,
    shared: SharedLoad,
}

impl LoadWaiter {
    async fn wait(self, cancel: &CancellationToken) -> Result<Arc<Chunk>> {
        let result = tokio::select! {
            result = self.shared.clone() => result,
            _ = cancel.cancelled() => Err(WaveformError::Cancelled),
        };

        match result {
            Err(WaveformError::Cancelled) if !cancel.is_cancelled() && self.inner.session.is_cancelled() => {
                Err(WaveformError::SessionClosed)
            }
            other => other,
        }
    }
}

impl Drop for LoadWaiter {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        let Some(load) = state.in_flight.get_mut(&self.index) else {
            return;
        };
        if load.id != self.id {
            return;
        }

        load.waiters = load.waiters.saturating_sub(1);
        if load.waiters == 0 {
            load.token.cancel();
            state.in_flight.remove(&self.index);
            trace!(chunk_index = self.index, "Last waiter left, load abandoned");
        }
    }
}
