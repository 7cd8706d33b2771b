//! # Waveform Engine
//!
//! Session facade over the byte source, header, chunk cache and range
//! composer.
//!
//! ## Lifecycle
//!
//! `Closed -> Open -> Closed`. [`WaveformEngine::open`] probes the source
//! size, reads and validates the header, and only then installs the session;
//! a failed open leaves the engine closed. Opening while open closes the
//! previous session first. [`WaveformEngine::close`] cancels outstanding loads
//! and detached prefetches, drops the cache and closes the source. Every read
//! on a closed engine fails with [`WaveformError::SessionClosed`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_waveform::{SessionConfig, SourceLocation, WaveformEngine};
//! use tokio_util::sync::CancellationToken;
//!
//! let engine = WaveformEngine::new();
//! let source = SourceLocation::file("/data/run-42.wvfm").connect(None).await?;
//! let header = engine.open(source, SessionConfig::default()).await?;
//!
//! let cancel = CancellationToken::new();
//! let window = engine.get_exact_range(262_000, 262_300, &cancel).await?;
//! assert_eq!(window.len(), 300);
//!
//! engine.close().await;
//! ```

use bridge_traits::http::HttpClient;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheInfo, CacheStats, ChunkCache};
use crate::chunk::{Chunk, ChunkStore};
use crate::composer::RangeComposer;
use crate::config::SessionConfig;
use crate::error::{Result, WaveformError};
use crate::header::{parse_header, WaveformHeader, HEADER_SIZE};
use crate::preview::{build_preview, Preview, DEFAULT_PREVIEW_WINDOW};
use crate::source::{ByteSource, SourceLocation};

/// One open file.
struct Session {
    source: Arc<dyn ByteSource>,
    header: WaveformHeader,
    config: SessionConfig,
    cache: ChunkCache,
    composer: RangeComposer,
}

impl Session {
    async fn close(&self) {
        self.cache.close();

        if let Err(e) = self.source.close().await {
            warn!(source = %self.source.describe(), error = %e, "Failed to close byte source");
        }
    }
}

/// Entry point for out-of-core waveform access.
#[derive(Default)]
pub struct WaveformEngine {
    session: RwLock<Option<Arc<Session>>>,
}

impl WaveformEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session on `source`, replacing any current session.
    #[instrument(skip(self, source, config), fields(source = %source.describe()))]
    pub async fn open(
        &self,
        source: Arc<dyn ByteSource>,
        config: SessionConfig,
    ) -> Result<WaveformHeader> {
        config.validate()?;

        self.close().await;

        let size = source.size().await?;
        let head = source
            .read_range(0, size.min(HEADER_SIZE as u64))
            .await?;
        let header = parse_header(&head, size)?;
        let chunk_samples = config.chunk_samples;

        let store = Arc::new(ChunkStore::new(Arc::clone(&source), header, chunk_samples));
        let cache = ChunkCache::new(store, &config);
        let composer = RangeComposer::new(cache.clone(), config.auto_prefetch_neighbor_chunks);

        let session = Arc::new(Session {
            source,
            header,
            config,
            cache,
            composer,
        });

        let previous = self.session.write().replace(session);
        if let Some(previous) = previous {
            // Lost a race with a concurrent open
            previous.close().await;
        }

        info!(
            sample_rate_hz = header.sample_rate_hz,
            sample_count = header.sample_count,
            chunk_samples,
            chunk_count = header.chunk_count(chunk_samples),
            "Waveform session opened"
        );

        Ok(header)
    }

    /// Connect `location` and open it.
    pub async fn open_location(
        &self,
        location: SourceLocation,
        http_client: Option<Arc<dyn HttpClient>>,
        config: SessionConfig,
    ) -> Result<WaveformHeader> {
        let source = location.connect(http_client).await?;
        self.open(source, config).await
    }

    /// Close the current session, if any. Idempotent.
    pub async fn close(&self) {
        let session = self.session.write().take();
        if let Some(session) = session {
            session.close().await;
            debug!("Waveform session closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.read().is_some()
    }

    pub fn header(&self) -> Option<WaveformHeader> {
        self.session.read().as_ref().map(|session| session.header)
    }

    pub fn config(&self) -> Option<SessionConfig> {
        self.session
            .read()
            .as_ref()
            .map(|session| session.config.clone())
    }

    fn current(&self) -> Result<Arc<Session>> {
        self.session
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(WaveformError::SessionClosed)
    }

    /// Chunk `index`, which must be in `[0, chunk_count)`.
    pub async fn get_chunk(&self, index: u32, cancel: &CancellationToken) -> Result<Arc<Chunk>> {
        let session = self.current()?;
        let chunk_count = session.cache.store().chunk_count();
        if index >= chunk_count {
            return Err(WaveformError::OutOfRange(format!(
                "chunk {} not in [0, {})",
                index, chunk_count
            )));
        }
        session.cache.get_or_load(index, cancel).await
    }

    /// Samples `[start, end)`, clamped to the file.
    pub async fn get_exact_range(
        &self,
        start: u64,
        end: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>> {
        let session = self.current()?;
        session.composer.get_exact_range(start, end, cancel).await
    }

    /// Concatenation of the listed chunks; out-of-range indices are skipped.
    pub async fn compose_chunks(
        &self,
        indices: &[i64],
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>> {
        let session = self.current()?;
        session.composer.compose_chunks(indices, cancel).await
    }

    /// Warm the chunks covering `[start, end)` plus `neighbors` each side.
    pub async fn prefetch_range(
        &self,
        start: u64,
        end: u64,
        neighbors: u32,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let session = self.current()?;
        session
            .composer
            .prefetch_range(start, end, neighbors, cancel)
            .await
    }

    /// Min/max overview with `points` buckets, read directly from the source.
    pub async fn preview(&self, points: usize, cancel: &CancellationToken) -> Result<Preview> {
        let session = self.current()?;
        let window = DEFAULT_PREVIEW_WINDOW.min(session.config.chunk_samples);
        build_preview(
            session.source.as_ref(),
            &session.header,
            points,
            window,
            cancel,
        )
        .await
    }

    pub fn cache_info(&self) -> Result<CacheInfo> {
        Ok(self.current()?.cache.info())
    }

    pub fn cache_stats(&self) -> Result<CacheStats> {
        Ok(self.current()?.cache.stats())
    }

    /// Resident chunk indices, most recently used first.
    pub fn cached_chunk_indices(&self) -> Result<Vec<u32>> {
        Ok(self.current()?.cache.resident_indices())
    }

    /// Drop resident chunks without closing the session.
    pub fn clear_cache(&self) -> Result<()> {
        self.current()?.cache.clear();
        Ok(())
    }
}
